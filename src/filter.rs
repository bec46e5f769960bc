use itertools::Itertools;

use crate::errors::{QueryError, Result};
use crate::method::Method;
use crate::value::{FilterValue, Scalar};

/// Marks a filter's participation in a disjunctive group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrState {
    #[default]
    None,
    Start,
    In,
    End,
}

/// One parsed, typed, method-tagged predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Key exactly as supplied, e.g. `"age[gte]"`.
    pub raw_key: String,
    /// Bare filter name before nesting resolution, e.g. `"age"`.
    pub query_name: String,
    /// Backend-ready expression after name resolution.
    pub expression: String,
    pub method: Method,
    pub value: FilterValue,
    pub or: OrState,
    /// Owning table/source when several sources share one query.
    pub source: Option<String>,
}

impl Filter {
    /// The condition expression for this filter, `?` placeholders included.
    ///
    /// An internally inconsistent filter (e.g. `IS` without the NULL
    /// sentinel, or `IN` over an empty list) is an error; the session-level
    /// renderer skips such filters.
    pub fn where_clause(&self) -> Result<String> {
        match self.method {
            Method::Eq | Method::Ne => match &self.value {
                FilterValue::One(_) => {
                    Ok(format!("{} {} ?", self.expression, self.method.sql()))
                }
                // Collections compare as bidirectional containment with the
                // array literal embedded, not bound.
                FilterValue::Many(items) => {
                    let lit = array_literal(items);
                    Ok(format!(
                        "{e} @> {lit} AND {e} <@ {lit}",
                        e = self.expression
                    ))
                }
                FilterValue::Null => Err(QueryError::UnknownMethod),
            },
            Method::Gt
            | Method::Lt
            | Method::Gte
            | Method::Lte
            | Method::Like
            | Method::Ilike
            | Method::Nlike
            | Method::Nilike => match &self.value {
                FilterValue::One(_) => {
                    Ok(format!("{} {} ?", self.expression, self.method.sql()))
                }
                _ => Err(QueryError::UnknownMethod),
            },
            Method::Is | Method::Not => match self.value {
                FilterValue::Null => {
                    Ok(format!("{} {} NULL", self.expression, self.method.sql()))
                }
                _ => Err(QueryError::UnknownMethod),
            },
            Method::In | Method::Nin => {
                let count = match &self.value {
                    FilterValue::One(_) => 1,
                    FilterValue::Many(items) => items.len(),
                    FilterValue::Null => 0,
                };
                if count == 0 {
                    return Err(QueryError::EmptyValue);
                }
                let placeholders = std::iter::repeat("?").take(count).join(", ");
                Ok(format!(
                    "{} {} ({})",
                    self.expression,
                    self.method.sql(),
                    placeholders
                ))
            }
            Method::Raw => Ok(self.expression.clone()),
        }
    }

    /// The bound arguments for this filter, in placeholder order.
    pub fn args(&self) -> Result<Vec<Scalar>> {
        match self.method {
            Method::Eq | Method::Ne => match &self.value {
                FilterValue::One(v) => Ok(vec![v.clone()]),
                FilterValue::Many(_) => Ok(Vec::new()),
                FilterValue::Null => Err(QueryError::UnknownMethod),
            },
            Method::Gt | Method::Lt | Method::Gte | Method::Lte => match &self.value {
                FilterValue::One(v) => Ok(vec![v.clone()]),
                _ => Err(QueryError::UnknownMethod),
            },
            Method::Like | Method::Ilike | Method::Nlike | Method::Nilike => {
                match &self.value {
                    FilterValue::One(Scalar::Str(s)) => {
                        Ok(vec![Scalar::Str(translate_wildcards(s))])
                    }
                    FilterValue::One(v) => Ok(vec![v.clone()]),
                    _ => Err(QueryError::UnknownMethod),
                }
            }
            Method::Is | Method::Not => match self.value {
                FilterValue::Null => Ok(Vec::new()),
                _ => Err(QueryError::UnknownMethod),
            },
            Method::In | Method::Nin => match &self.value {
                FilterValue::One(v) => Ok(vec![v.clone()]),
                FilterValue::Many(items) => Ok(items.clone()),
                FilterValue::Null => Err(QueryError::EmptyValue),
            },
            Method::Raw => Ok(Vec::new()),
        }
    }
}

// Postgres-style array literal, elements rendered bare: '{1,2}'.
fn array_literal(items: &[Scalar]) -> String {
    format!("'{{{}}}'", items.iter().join(","))
}

// A `*` at either end of a pattern value becomes the SQL wildcard; inner
// stars are literal.
fn translate_wildcards(value: &str) -> String {
    let mut out = value.to_string();
    if out.len() >= 2 && out.starts_with('*') {
        out.replace_range(0..1, "%");
    }
    if out.len() >= 2 && out.ends_with('*') {
        let n = out.len();
        out.replace_range(n - 1..n, "%");
    }
    out
}
