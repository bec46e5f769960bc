use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{QueryError, Result};
use crate::fields::FieldType;
use crate::value::Scalar;

/// Thread-safe validator invoked once per coerced scalar.
pub type ValidationFunc = Arc<dyn Fn(&Scalar) -> Result<()> + Send + Sync>;

/// Declaration registry keyed by filter name. Keys may carry `:type` and
/// `:required` tags, e.g. `"id:int"`, `"count:int:required"`. A `None` entry
/// declares the name without attaching a validator.
#[derive(Clone, Default)]
pub struct Validations {
    inner: BTreeMap<String, Option<ValidationFunc>>,
}

impl fmt::Debug for Validations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.keys()).finish()
    }
}

impl Validations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable declaration, used at construction time.
    pub fn add(mut self, key: &str, func: Option<ValidationFunc>) -> Self {
        self.inner.insert(key.to_string(), func);
        self
    }

    pub fn set(&mut self, key: &str, func: Option<ValidationFunc>) {
        self.inner.insert(key.to_string(), func);
    }

    /// Remove every declaration for `name`, tagged or not. Returns whether
    /// anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let keys: Vec<String> = self
            .inner
            .keys()
            .filter(|k| k.as_str() == name || base_name(k) == name)
            .cloned()
            .collect();
        for k in &keys {
            self.inner.remove(k);
        }
        !keys.is_empty()
    }

    /// Find the declaration for a bare name, looking through `:type` tags.
    /// Outer `None` means the name is not declared at all.
    pub fn lookup(&self, name: &str) -> Option<Option<ValidationFunc>> {
        for (k, v) in &self.inner {
            if k.as_str() == name || base_name(k) == name {
                return Some(v.clone());
            }
        }
        None
    }

    /// The `:type` tag declared for a name, if any.
    pub fn declared_type(&self, name: &str) -> Option<FieldType> {
        for k in self.inner.keys() {
            if base_name(k) == name {
                for tag in k.split(':').skip(1) {
                    if let Some(t) = FieldType::parse(tag) {
                        return Some(t);
                    }
                }
            }
        }
        None
    }

    /// Consume `:required` modifiers: strip them from the stored keys and
    /// return the affected base names. After this the registry only holds
    /// plain (optionally typed) declarations.
    pub fn take_required(&mut self) -> Vec<String> {
        let tagged: Vec<String> = self
            .inner
            .keys()
            .filter(|k| k.split(':').skip(1).any(|t| t == "required"))
            .cloned()
            .collect();
        let mut names = Vec::with_capacity(tagged.len());
        for key in tagged {
            let func = self.inner.remove(&key).flatten();
            let stripped: String = key
                .split(':')
                .filter(|t| *t != "required")
                .collect::<Vec<_>>()
                .join(":");
            names.push(base_name(&stripped).to_string());
            self.inner.insert(stripped, func);
        }
        names
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }
}

fn base_name(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}

/// Run several validators in sequence, failing on the first rejection.
pub fn multi(funcs: Vec<ValidationFunc>) -> ValidationFunc {
    Arc::new(move |value| {
        for f in &funcs {
            f(value)?;
        }
        Ok(())
    })
}

/// Accept only values from the given set.
pub fn one_of<I, T>(values: I) -> ValidationFunc
where
    I: IntoIterator<Item = T>,
    T: Into<Scalar>,
{
    let allowed: Vec<Scalar> = values.into_iter().map(Into::into).collect();
    Arc::new(move |value| {
        if allowed.contains(value) {
            Ok(())
        } else {
            Err(QueryError::NotInScope(value.to_string()))
        }
    })
}

/// Integer lower bound (inclusive).
pub fn min(bound: i64) -> ValidationFunc {
    Arc::new(move |value| match value {
        Scalar::Int(v) if *v >= bound => Ok(()),
        other => Err(QueryError::NotInScope(other.to_string())),
    })
}

/// Integer upper bound (inclusive).
pub fn max(bound: i64) -> ValidationFunc {
    Arc::new(move |value| match value {
        Scalar::Int(v) if *v <= bound => Ok(()),
        other => Err(QueryError::NotInScope(other.to_string())),
    })
}

/// Integer range check, both bounds inclusive.
pub fn min_max(lo: i64, hi: i64) -> ValidationFunc {
    Arc::new(move |value| match value {
        Scalar::Int(v) if *v >= lo && *v <= hi => Ok(()),
        other => Err(QueryError::NotInScope(other.to_string())),
    })
}

/// Float lower bound (inclusive).
pub fn min_float(bound: f64) -> ValidationFunc {
    Arc::new(move |value| match value {
        Scalar::Float(v) if *v >= bound => Ok(()),
        other => Err(QueryError::NotInScope(other.to_string())),
    })
}

/// Float upper bound (inclusive).
pub fn max_float(bound: f64) -> ValidationFunc {
    Arc::new(move |value| match value {
        Scalar::Float(v) if *v <= bound => Ok(()),
        other => Err(QueryError::NotInScope(other.to_string())),
    })
}

/// Float range check, both bounds inclusive.
pub fn min_max_float(lo: f64, hi: f64) -> ValidationFunc {
    Arc::new(move |value| match value {
        Scalar::Float(v) if *v >= lo && *v <= hi => Ok(()),
        other => Err(QueryError::NotInScope(other.to_string())),
    })
}

/// Reject empty strings.
pub fn not_empty() -> ValidationFunc {
    Arc::new(|value| match value {
        Scalar::Str(s) if !s.is_empty() => Ok(()),
        other => Err(QueryError::NotInScope(other.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_of_reports_the_offending_value() {
        let v = one_of(["one", "two"]);
        assert!(v(&Scalar::Str("one".into())).is_ok());
        assert_eq!(
            v(&Scalar::Str("three".into())).unwrap_err().to_string(),
            "three: not in scope"
        );
        let nums = one_of([1i64, 2]);
        assert_eq!(
            nums(&Scalar::Int(3)).unwrap_err().to_string(),
            "3: not in scope"
        );
    }

    #[test]
    fn bounds_only_accept_matching_scalar_kind() {
        assert!(min(10)(&Scalar::Int(10)).is_ok());
        assert!(min(10)(&Scalar::Int(9)).is_err());
        assert!(min(10)(&Scalar::Str("11".into())).is_err());
        assert!(min_max_float(1.0, 2.0)(&Scalar::Float(1.5)).is_ok());
    }

    #[test]
    fn multi_short_circuits() {
        let v = multi(vec![min(2), max(10)]);
        assert!(v(&Scalar::Int(5)).is_ok());
        assert!(v(&Scalar::Int(1)).is_err());
        assert!(v(&Scalar::Int(11)).is_err());
    }

    #[test]
    fn typed_keys_resolve_by_base_name() {
        let v = Validations::new()
            .add("id:int", None)
            .add("s", Some(one_of(["super"])));
        assert!(v.lookup("id").is_some());
        assert_eq!(v.declared_type("id"), Some(FieldType::Int));
        assert_eq!(v.declared_type("s"), None);
        assert!(v.lookup("missing").is_none());
    }

    #[test]
    fn required_tags_are_consumed() {
        let mut v = Validations::new()
            .add("limit:required", None)
            .add("count:int:required", None)
            .add("one:int", None);
        let mut required = v.take_required();
        required.sort();
        assert_eq!(required, vec!["count".to_string(), "limit".to_string()]);
        assert!(!v.contains("limit:required"));
        assert!(v.contains("limit"));
        assert!(v.contains("count:int"));
        assert_eq!(v.declared_type("count"), Some(FieldType::Int));
        assert!(v.take_required().is_empty());
    }

    #[test]
    fn remove_drops_tagged_declarations() {
        let mut v = Validations::new().add("name:string", None).add("fields", None);
        assert!(v.remove("name"));
        assert!(v.remove("fields"));
        assert!(!v.remove("fields"));
    }
}
