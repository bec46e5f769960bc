use crate::errors::{QueryError, Result};
use crate::method::Method;

/// Split a raw filter key of the form `name[method]` into its parts.
///
/// No bracket section means the method defaults to `EQ`; an empty section
/// (`name[]`) does too. An opening bracket without a closing one is
/// malformed input.
pub fn parse_key(key: &str) -> Result<(String, Method)> {
    let Some(open) = key.find('[') else {
        return Ok((key.to_string(), Method::Eq));
    };
    let name = key[..open].to_string();
    let rest = &key[open + 1..];
    let close = rest.find(']').ok_or(QueryError::BadFormat)?;
    let tag = &rest[..close];
    if tag.is_empty() {
        return Ok((name, Method::Eq));
    }
    Ok((name, Method::parse(tag)?))
}
