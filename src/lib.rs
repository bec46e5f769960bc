//! Turn decoded HTTP query parameters into a parameterized SQL filtering
//! clause: a `WHERE` body with `?` placeholders, the matching ordered
//! argument list, and companion `SELECT` / `ORDER BY` / `LIMIT` / `OFFSET`
//! fragments.
//!
//! ```
//! use rest_query_filters::{validation, Params, Query, Validations};
//!
//! let mut params = Params::new();
//! params.insert("id[gte]".into(), vec!["1".into()]);
//! params.insert("s".into(), vec!["super".into()]);
//!
//! let mut q = Query::new()
//!     .with_params(params)
//!     .with_validations(
//!         Validations::new()
//!             .add("id:int", None)
//!             .add("s", Some(validation::one_of(["super", "best"]))),
//!     );
//! q.parse().unwrap();
//! assert_eq!(q.where_clause(), "id >= ? AND s = ?");
//! assert_eq!(q.args().len(), 2);
//! ```

pub mod errors;
pub mod fields;
pub mod filter;
pub mod method;
pub mod query;
pub mod validation;
pub mod value;

mod key;
mod resolve;
mod timeparse;

pub use errors::{QueryError, Result};
pub use fields::{FieldDescriptor, FieldMap, FieldType};
pub use filter::{Filter, OrState};
pub use method::Method;
pub use query::{Params, Query, Sort};
pub use validation::{ValidationFunc, Validations};
pub use value::{FilterValue, Scalar};

/// Convenience: build a session from a parameter mapping and declarations,
/// parse it, and hand it back ready for rendering.
pub fn parse(params: Params, validations: Validations) -> Result<Query> {
    let mut q = Query::new()
        .with_params(params)
        .with_validations(validations);
    q.parse()?;
    Ok(q)
}
