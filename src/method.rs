use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, Result};

/// Comparison method selected by the `[method]` suffix of a filter key.
///
/// `Raw` never comes from a key; it marks pass-through conditions appended
/// programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    Ilike,
    Nlike,
    Nilike,
    Is,
    Not,
    In,
    Nin,
    Raw,
}

impl Method {
    /// Look up a bracketed method name, case-insensitively.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "EQ" => Ok(Self::Eq),
            "NE" => Ok(Self::Ne),
            "GT" => Ok(Self::Gt),
            "LT" => Ok(Self::Lt),
            "GTE" => Ok(Self::Gte),
            "LTE" => Ok(Self::Lte),
            "LIKE" => Ok(Self::Like),
            "ILIKE" => Ok(Self::Ilike),
            "NLIKE" => Ok(Self::Nlike),
            "NILIKE" => Ok(Self::Nilike),
            "IS" => Ok(Self::Is),
            "NOT" => Ok(Self::Not),
            "IN" => Ok(Self::In),
            "NIN" => Ok(Self::Nin),
            _ => Err(QueryError::UnknownMethod),
        }
    }

    /// SQL operator text for this method.
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::Ilike => "ILIKE",
            Self::Nlike => "NOT LIKE",
            Self::Nilike => "NOT ILIKE",
            Self::Is => "IS",
            Self::Not => "IS NOT",
            Self::In => "IN",
            Self::Nin => "NOT IN",
            Self::Raw => "",
        }
    }
}
