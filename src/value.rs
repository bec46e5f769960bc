use std::fmt;

use serde::Serialize;

use crate::errors::{QueryError, Result};
use crate::fields::FieldType;
use crate::method::Method;
use crate::timeparse;

/// One coerced, bindable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Coerced payload of one filter: a scalar, a homogeneous collection, or the
/// NULL sentinel carried by `IS`/`NOT` filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(Scalar),
    Many(Vec<Scalar>),
    Null,
}

impl FilterValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<Scalar> for FilterValue {
    fn from(v: Scalar) -> Self {
        Self::One(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::One(Scalar::Int(v))
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::One(Scalar::Float(v))
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::One(Scalar::Bool(v))
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::One(Scalar::Str(v.to_string()))
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::One(Scalar::Str(v))
    }
}

impl From<Vec<Scalar>> for FilterValue {
    fn from(v: Vec<Scalar>) -> Self {
        Self::Many(v)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v.into_iter().map(Scalar::Str).collect())
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Many(v.into_iter().map(Scalar::Int).collect())
    }
}

/// Delimiter-split a raw parameter value. Entries are trimmed and empties
/// dropped; a value without the delimiter stays a single entry.
pub fn split_list(raw: &str, delimiter: &str) -> Vec<String> {
    if raw.contains(delimiter) {
        raw.split(delimiter)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![raw.to_string()]
    }
}

/// Coerce a raw textual value into a typed [`FilterValue`], enforcing the
/// per-type method allow-list.
pub fn coerce(kind: FieldType, method: Method, raw: &str, delimiter: &str) -> Result<FilterValue> {
    let list = split_list(raw, delimiter);
    if list.is_empty() {
        return Err(QueryError::BadFormat);
    }
    match kind {
        FieldType::Int => coerce_single_or_list(&list, method, parse_int),
        FieldType::Float => coerce_single_or_list(&list, method, parse_float),
        FieldType::Bool => coerce_bool(&list, method),
        FieldType::Str => coerce_string(&list, method),
        FieldType::Time => coerce_time(&list, method),
        FieldType::IntArray => coerce_array(&list, method, parse_int),
        FieldType::FloatArray => coerce_array(&list, method, parse_float),
        FieldType::StringArray => coerce_array(&list, method, parse_str),
        FieldType::Json | FieldType::Object | FieldType::Custom => coerce_null_only(&list, method),
    }
}

fn is_null_literal(s: &str) -> bool {
    s.eq_ignore_ascii_case("null")
}

fn parse_int(s: &str) -> Result<Scalar> {
    s.parse::<i64>().map(Scalar::Int).map_err(|_| QueryError::BadFormat)
}

fn parse_float(s: &str) -> Result<Scalar> {
    s.parse::<f64>().map(Scalar::Float).map_err(|_| QueryError::BadFormat)
}

fn parse_str(s: &str) -> Result<Scalar> {
    Ok(Scalar::Str(s.to_string()))
}

// Accepted textual bool forms: 1/t/true and 0/f/false, in the usual casings.
fn parse_bool(s: &str) -> Result<Scalar> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Scalar::Bool(true)),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Scalar::Bool(false)),
        _ => Err(QueryError::BadFormat),
    }
}

/// int/float: the full ordered-comparison family on a single value,
/// EQ/NE/IN/NIN on a list, IS/NOT only with the NULL literal.
fn coerce_single_or_list(
    list: &[String],
    method: Method,
    parse: fn(&str) -> Result<Scalar>,
) -> Result<FilterValue> {
    if list.len() == 1 {
        match method {
            Method::Eq
            | Method::Ne
            | Method::Gt
            | Method::Lt
            | Method::Gte
            | Method::Lte
            | Method::In
            | Method::Nin => parse(&list[0]).map(FilterValue::One),
            Method::Is | Method::Not => null_sentinel(&list[0]),
            _ => Err(QueryError::MethodNotAllowed),
        }
    } else {
        match method {
            Method::Eq | Method::Ne | Method::In | Method::Nin => {
                collect_many(list, parse)
            }
            _ => Err(QueryError::MethodNotAllowed),
        }
    }
}

fn coerce_bool(list: &[String], method: Method) -> Result<FilterValue> {
    if list.len() != 1 {
        return Err(QueryError::MethodNotAllowed);
    }
    match method {
        Method::Eq | Method::Ne => parse_bool(&list[0]).map(FilterValue::One),
        Method::Is | Method::Not => null_sentinel(&list[0]),
        _ => Err(QueryError::MethodNotAllowed),
    }
}

fn coerce_string(list: &[String], method: Method) -> Result<FilterValue> {
    if list.len() == 1 {
        match method {
            Method::Eq
            | Method::Ne
            | Method::Gt
            | Method::Lt
            | Method::Gte
            | Method::Lte
            | Method::Like
            | Method::Ilike
            | Method::Nlike
            | Method::Nilike
            | Method::In
            | Method::Nin => Ok(FilterValue::One(Scalar::Str(list[0].clone()))),
            Method::Is | Method::Not => null_sentinel(&list[0]),
            _ => Err(QueryError::MethodNotAllowed),
        }
    } else {
        match method {
            Method::Eq | Method::Ne | Method::In | Method::Nin => {
                collect_many(list, parse_str)
            }
            _ => Err(QueryError::MethodNotAllowed),
        }
    }
}

// Time values are normalized to RFC 3339 UTC text and then behave like the
// numeric comparison family.
fn coerce_time(list: &[String], method: Method) -> Result<FilterValue> {
    let parse = |s: &str| timeparse::canonical(s).map(Scalar::Str);
    if list.len() == 1 {
        match method {
            Method::Eq
            | Method::Ne
            | Method::Gt
            | Method::Lt
            | Method::Gte
            | Method::Lte
            | Method::In
            | Method::Nin => parse(&list[0]).map(FilterValue::One),
            Method::Is | Method::Not => null_sentinel(&list[0]),
            _ => Err(QueryError::MethodNotAllowed),
        }
    } else {
        match method {
            Method::Eq | Method::Ne | Method::In | Method::Nin => {
                let mut out = Vec::with_capacity(list.len());
                for s in list {
                    out.push(parse(s)?);
                }
                Ok(FilterValue::Many(out))
            }
            _ => Err(QueryError::MethodNotAllowed),
        }
    }
}

/// Array-typed fields: the whole (possibly single-element) list coerces
/// element-wise; only EQ/NE (containment) and IS/NOT NULL apply.
fn coerce_array(
    list: &[String],
    method: Method,
    parse: fn(&str) -> Result<Scalar>,
) -> Result<FilterValue> {
    match method {
        Method::Eq | Method::Ne => collect_many(list, parse),
        Method::Is | Method::Not if list.len() == 1 => null_sentinel(&list[0]),
        Method::Is | Method::Not => Err(QueryError::BadFormat),
        _ => Err(QueryError::MethodNotAllowed),
    }
}

/// json/object/custom fields are not directly comparable; only null checks.
fn coerce_null_only(list: &[String], method: Method) -> Result<FilterValue> {
    match method {
        Method::Is | Method::Not if list.len() == 1 => null_sentinel(&list[0]),
        _ => Err(QueryError::MethodNotAllowed),
    }
}

fn null_sentinel(s: &str) -> Result<FilterValue> {
    if is_null_literal(s) {
        Ok(FilterValue::Null)
    } else {
        Err(QueryError::BadFormat)
    }
}

fn collect_many(list: &[String], parse: fn(&str) -> Result<Scalar>) -> Result<FilterValue> {
    let mut out = Vec::with_capacity(list.len());
    for s in list {
        out.push(parse(s)?);
    }
    Ok(FilterValue::Many(out))
}
