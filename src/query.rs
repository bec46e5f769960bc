use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use tracing::debug;

use crate::errors::{QueryError, Result};
use crate::fields::{FieldMap, FieldType};
use crate::filter::{Filter, OrState};
use crate::key::parse_key;
use crate::method::Method;
use crate::validation::{ValidationFunc, Validations};
use crate::value::{coerce, split_list, FilterValue, Scalar};

/// Decoded query parameters: name to ordered values. Producing this mapping
/// (URL decoding) is the caller's job.
pub type Params = BTreeMap<String, Vec<String>>;

/// One `ORDER BY` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub by: String,
    pub desc: bool,
}

const RESERVED: &[&str] = &["fields", "sort", "limit", "offset"];

/// A parsing session: consumes a parameter mapping once and exposes the
/// accumulated filter list plus independently renderable SQL fragments.
///
/// The session is single-owner mutable state. `Clone` is the supported way
/// to fork an independent variant; validators are shared by reference.
#[derive(Debug, Clone)]
pub struct Query {
    params: Params,
    validations: Validations,
    field_map: FieldMap,
    required: BTreeSet<String>,
    special: Vec<String>,

    pub fields: Vec<String>,
    pub sorts: Vec<Sort>,
    pub filters: Vec<Filter>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,

    delimiter_in: String,
    delimiter_or: String,
    ignore_unknown: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            params: Params::new(),
            validations: Validations::new(),
            field_map: FieldMap::new(),
            required: BTreeSet::new(),
            special: Vec::new(),
            fields: Vec::new(),
            sorts: Vec::new(),
            filters: Vec::new(),
            limit: None,
            offset: None,
            delimiter_in: ",".to_string(),
            delimiter_or: "|".to_string(),
            ignore_unknown: false,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_validations(mut self, validations: Validations) -> Self {
        self.validations = validations;
        self
    }

    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub fn set_validations(&mut self, validations: Validations) {
        self.validations = validations;
    }

    pub fn set_field_map(&mut self, field_map: FieldMap) {
        self.field_map = field_map;
    }

    /// Delimiter splitting multi-value operands (default `,`).
    pub fn set_delimiter_in(&mut self, delimiter: &str) {
        self.delimiter_in = delimiter.to_string();
    }

    /// Delimiter splitting OR-group members inside one value (default `|`).
    pub fn set_delimiter_or(&mut self, delimiter: &str) {
        self.delimiter_or = delimiter.to_string();
    }

    /// When on, unknown filter names are skipped instead of failing.
    pub fn ignore_unknown_filters(&mut self, on: bool) {
        self.ignore_unknown = on;
    }

    /// Names accepted as filters without any validation declaration.
    pub fn allow_special_filters<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special.extend(names.into_iter().map(Into::into));
    }

    pub fn add_validation(&mut self, key: &str, func: Option<ValidationFunc>) -> &mut Self {
        self.validations.set(key, func);
        self
    }

    pub fn remove_validation(&mut self, name: &str) -> Result<()> {
        if self.validations.remove(name) {
            Ok(())
        } else {
            Err(QueryError::ValidationNotFound)
        }
    }

    /// Consume the parameter mapping and rebuild fields, sorts, paging and
    /// the filter list. The first failure aborts, wrapped with the
    /// offending key; a failed parse leaves only the state accumulated
    /// before the failing key and callers must not use it.
    pub fn parse(&mut self) -> Result<()> {
        self.fields.clear();
        self.sorts.clear();
        self.filters.clear();
        self.limit = None;
        self.offset = None;

        for name in self.validations.take_required() {
            self.required.insert(name);
        }

        let mut seen: BTreeSet<String> = BTreeSet::new();
        let params = self.params.clone();
        for (key, values) in &params {
            if let Some(reserved) = reserved_name(key) {
                match reserved {
                    "fields" => self.parse_fields(key, values)?,
                    "sort" => self.parse_sort(key, values)?,
                    "limit" => self.parse_limit(key, values)?,
                    _ => self.parse_offset(key, values)?,
                }
                seen.insert(reserved.to_string());
                continue;
            }
            for value in values {
                self.parse_filter_param(key, value)?;
            }
        }

        for f in &self.filters {
            seen.insert(f.query_name.clone());
        }
        for name in &self.required {
            if !seen.contains(name) {
                return Err(QueryError::Required.with_key(name));
            }
        }
        debug!(filters = self.filters.len(), "query parsed");
        Ok(())
    }

    fn parse_fields(&mut self, key: &str, values: &[String]) -> Result<()> {
        if values.len() != 1 {
            return Err(QueryError::BadFormat.with_key(key));
        }
        let validate = match self.validations.lookup("fields") {
            Some(Some(f)) => f,
            _ => return Err(QueryError::ValidationNotFound.with_key(key)),
        };
        let list = clean_list(&split_list(&values[0], &self.delimiter_in));
        for name in &list {
            validate(&Scalar::Str(name.clone())).map_err(|e| e.with_key(key))?;
        }
        self.fields = list;
        Ok(())
    }

    fn parse_sort(&mut self, key: &str, values: &[String]) -> Result<()> {
        if values.len() != 1 {
            return Err(QueryError::BadFormat.with_key(key));
        }
        let validate = match self.validations.lookup("sort") {
            Some(Some(f)) => f,
            _ => return Err(QueryError::ValidationNotFound.with_key(key)),
        };
        for entry in clean_list(&split_list(&values[0], &self.delimiter_in)) {
            let (by, desc) = match entry.strip_prefix('-') {
                Some(rest) => (rest.to_string(), true),
                None => (entry.strip_prefix('+').unwrap_or(&entry).to_string(), false),
            };
            validate(&Scalar::Str(by.clone())).map_err(|e| e.with_key(key))?;
            self.sorts.push(Sort { by, desc });
        }
        Ok(())
    }

    fn parse_limit(&mut self, key: &str, values: &[String]) -> Result<()> {
        let n = parse_page_bound(key, values)?;
        if n < 1 {
            return Err(QueryError::NotInScope(n.to_string()).with_key(key));
        }
        if let Some(Some(validate)) = self.validations.lookup("limit") {
            validate(&Scalar::Int(n)).map_err(|e| e.with_key(key))?;
        }
        self.limit = Some(n);
        Ok(())
    }

    fn parse_offset(&mut self, key: &str, values: &[String]) -> Result<()> {
        let n = parse_page_bound(key, values)?;
        if n < 0 {
            return Err(QueryError::NotInScope(n.to_string()).with_key(key));
        }
        if let Some(Some(validate)) = self.validations.lookup("offset") {
            validate(&Scalar::Int(n)).map_err(|e| e.with_key(key))?;
        }
        self.offset = Some(n);
        Ok(())
    }

    /// One raw parameter value: either a single filter or an OR-group split
    /// on the group delimiter, where members after the first may carry their
    /// own `key=value`.
    fn parse_filter_param(&mut self, key: &str, value: &str) -> Result<()> {
        let mut members: Vec<(String, String)> = Vec::new();
        if value.contains(&self.delimiter_or) {
            for (i, part) in value.split(self.delimiter_or.as_str()).enumerate() {
                if i == 0 {
                    members.push((key.to_string(), part.to_string()));
                } else {
                    match part.split_once('=') {
                        Some((k, v)) => members.push((k.to_string(), v.to_string())),
                        None => members.push((key.to_string(), part.to_string())),
                    }
                }
            }
        } else {
            members.push((key.to_string(), value.to_string()));
        }

        let mut group: Vec<Filter> = Vec::new();
        for (k, v) in &members {
            if let Some(f) = self.new_filter(k, v)? {
                group.push(f);
            }
        }
        // OR state is tagged over the members that survived, so a skipped
        // unknown name cannot leave the group unbalanced.
        if group.len() > 1 {
            let last = group.len() - 1;
            for (i, f) in group.iter_mut().enumerate() {
                f.or = match i {
                    0 => OrState::Start,
                    i if i == last => OrState::End,
                    _ => OrState::In,
                };
            }
        }
        self.filters.extend(group);
        Ok(())
    }

    /// Build one filter from a key/value pair. `Ok(None)` means the name is
    /// unknown and the session ignores unknown names.
    fn new_filter(&self, raw_key: &str, value: &str) -> Result<Option<Filter>> {
        if value.trim().is_empty() {
            return Err(QueryError::EmptyValue.with_key(raw_key));
        }
        let (name, method) = parse_key(raw_key).map_err(|e| e.with_key(raw_key))?;

        let special = self.special.iter().any(|s| s == &name);
        let declaration = self.validations.lookup(&name);
        let known =
            special || declaration.is_some() || self.field_map.get(&name).is_some();
        if !known {
            if self.ignore_unknown {
                debug!(key = raw_key, "ignoring unknown filter");
                return Ok(None);
            }
            return Err(QueryError::FilterNotFound.with_key(raw_key));
        }

        let kind = self.detect_type(&name);
        let value =
            coerce(kind, method, value, &self.delimiter_in).map_err(|e| e.with_key(raw_key))?;

        if !value.is_null() {
            if let Some(Some(validate)) = &declaration {
                validate_value(validate, &value).map_err(|e| e.with_key(raw_key))?;
            }
        }

        Ok(Some(Filter {
            raw_key: raw_key.to_string(),
            query_name: name.clone(),
            expression: self.field_map.resolve(&name),
            method,
            value,
            or: OrState::None,
            source: self.field_map.get(&name).and_then(|d| d.source.clone()),
        }))
    }

    fn detect_type(&self, name: &str) -> FieldType {
        if let Some(kind) = self.field_map.kind(name) {
            return kind;
        }
        self.validations
            .declared_type(name)
            .unwrap_or(FieldType::Str)
    }

    // ---- rendering ----

    /// `SELECT` column list: `*` when no fields were requested.
    pub fn fields_clause(&self) -> String {
        if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields
                .iter()
                .map(|f| self.field_map.resolve(f))
                .join(", ")
        }
    }

    pub fn select_sql(&self) -> String {
        format!("SELECT {}", self.fields_clause())
    }

    /// `WHERE` body without the keyword; empty when nothing renders.
    ///
    /// A filter whose own rendering fails contributes nothing and leaves
    /// the surrounding AND/OR structure intact.
    pub fn where_clause(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut i = 0;
        while i < self.filters.len() {
            let f = &self.filters[i];
            if f.or == OrState::Start {
                let mut members: Vec<String> = Vec::new();
                let mut j = i;
                while j < self.filters.len() {
                    let g = &self.filters[j];
                    if j > i && matches!(g.or, OrState::None | OrState::Start) {
                        break;
                    }
                    if let Ok(cond) = g.where_clause() {
                        members.push(cond);
                    }
                    j += 1;
                    if g.or == OrState::End {
                        break;
                    }
                }
                match members.len() {
                    0 => {}
                    1 => parts.push(members.remove(0)),
                    _ => parts.push(format!("({})", members.join(" OR "))),
                }
                i = j;
            } else {
                if let Ok(cond) = f.where_clause() {
                    parts.push(cond);
                }
                i += 1;
            }
        }
        parts.join(" AND ")
    }

    /// `" WHERE ..."` or empty, for direct concatenation.
    pub fn where_sql(&self) -> String {
        let body = self.where_clause();
        if body.is_empty() {
            String::new()
        } else {
            format!(" WHERE {body}")
        }
    }

    /// Ordered argument list matching the placeholders of
    /// [`Self::where_clause`] left to right.
    pub fn args(&self) -> Vec<Scalar> {
        let mut out = Vec::new();
        for f in &self.filters {
            let (Ok(_), Ok(mut args)) = (f.where_clause(), f.args()) else {
                continue;
            };
            out.append(&mut args);
        }
        out
    }

    pub fn order_clause(&self) -> String {
        self.sorts
            .iter()
            .map(|s| {
                let by = self.field_map.resolve(&s.by);
                if s.desc {
                    format!("{by} DESC")
                } else {
                    by
                }
            })
            .join(", ")
    }

    pub fn order_sql(&self) -> String {
        let body = self.order_clause();
        if body.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {body}")
        }
    }

    pub fn limit_sql(&self) -> String {
        self.limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default()
    }

    pub fn offset_sql(&self) -> String {
        self.offset
            .map(|n| format!(" OFFSET {n}"))
            .unwrap_or_default()
    }

    /// The full single statement against a caller-supplied source name.
    pub fn sql(&self, table: &str) -> String {
        format!(
            "{} FROM {}{}{}{}{}",
            self.select_sql(),
            table,
            self.where_sql(),
            self.order_sql(),
            self.limit_sql(),
            self.offset_sql()
        )
    }

    // ---- list operations ----

    pub fn have_filter(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.query_name == name)
    }

    pub fn get_filter(&self, name: &str) -> Result<&Filter> {
        self.filters
            .iter()
            .find(|f| f.query_name == name)
            .ok_or(QueryError::FilterNotFound)
    }

    /// Append a programmatic filter; the name resolves through the field
    /// registry like a parsed one.
    pub fn add_filter(
        &mut self,
        name: &str,
        method: Method,
        value: impl Into<FilterValue>,
    ) -> &mut Self {
        self.filters.push(Filter {
            raw_key: name.to_string(),
            query_name: name.to_string(),
            expression: self.field_map.resolve(name),
            method,
            value: value.into(),
            or: OrState::None,
            source: self.field_map.get(name).and_then(|d| d.source.clone()),
        });
        self
    }

    /// Append a pass-through condition embedded verbatim, binding nothing.
    pub fn add_filter_raw(&mut self, condition: &str) -> &mut Self {
        self.filters.push(Filter {
            raw_key: String::new(),
            query_name: condition.to_string(),
            expression: condition.to_string(),
            method: Method::Raw,
            value: FilterValue::Null,
            or: OrState::None,
            source: None,
        });
        self
    }

    /// Build a parenthesized OR group through a sub-session and splice it
    /// onto this one. The closure sees a fork of this session with an empty
    /// filter list.
    pub fn add_or_filters<F: FnOnce(&mut Query)>(&mut self, build: F) -> &mut Self {
        let mut sub = self.clone();
        sub.filters.clear();
        build(&mut sub);
        let mut group = sub.filters;
        if group.len() > 1 {
            let last = group.len() - 1;
            for (i, f) in group.iter_mut().enumerate() {
                f.or = match i {
                    0 => OrState::Start,
                    i if i == last => OrState::End,
                    _ => OrState::In,
                };
            }
        }
        self.filters.extend(group);
        self
    }

    /// Remove every filter with this query name, repairing the OR state of
    /// group neighbors so remaining members still render well-formed.
    pub fn remove_filter(&mut self, name: &str) -> Result<()> {
        let mut removed = false;
        while let Some(idx) = self.filters.iter().position(|f| f.query_name == name) {
            self.repair_neighbors(idx);
            self.filters.remove(idx);
            removed = true;
        }
        if removed {
            Ok(())
        } else {
            Err(QueryError::FilterNotFound)
        }
    }

    fn repair_neighbors(&mut self, idx: usize) {
        match self.filters[idx].or {
            OrState::Start => {
                if let Some(next) = self.filters.get_mut(idx + 1) {
                    next.or = match next.or {
                        OrState::End => OrState::None,
                        OrState::In => OrState::Start,
                        other => other,
                    };
                }
            }
            OrState::End => {
                if idx > 0 {
                    if let Some(prev) = self.filters.get_mut(idx - 1) {
                        prev.or = match prev.or {
                            OrState::Start => OrState::None,
                            OrState::In => OrState::End,
                            other => other,
                        };
                    }
                }
            }
            OrState::None | OrState::In => {}
        }
    }

    /// Rename filters query-name to backend-name; renamed filters resolve
    /// their expression afresh (an unregistered new name embeds verbatim).
    pub fn replace_names<I, S>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        for (from, to) in pairs {
            let (from, to) = (from.into(), to.into());
            for f in &mut self.filters {
                if f.query_name == from {
                    f.query_name = to.clone();
                    f.expression = self.field_map.resolve(&to);
                }
            }
        }
    }

    pub fn have_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    pub fn add_field(&mut self, name: &str) -> &mut Self {
        self.fields.push(name.to_string());
        self
    }

    pub fn have_sort_by(&self, by: &str) -> bool {
        self.sorts.iter().any(|s| s.by == by)
    }

    pub fn add_sort_by(&mut self, by: &str, desc: bool) -> &mut Self {
        self.sorts.push(Sort {
            by: by.to_string(),
            desc,
        });
        self
    }
}

fn validate_value(validate: &ValidationFunc, value: &FilterValue) -> Result<()> {
    match value {
        FilterValue::One(s) => validate(s),
        FilterValue::Many(items) => {
            for s in items {
                validate(s)?;
            }
            Ok(())
        }
        FilterValue::Null => Ok(()),
    }
}

/// Reserved parameter names match case-insensitively and accept an optional
/// `[in]` suffix as a synonym.
fn reserved_name(key: &str) -> Option<&'static str> {
    let (base, tag) = match key.find('[') {
        Some(open) => {
            let rest = &key[open + 1..];
            let close = rest.find(']')?;
            (&key[..open], Some(&rest[..close]))
        }
        None => (key, None),
    };
    if tag.is_some_and(|t| !t.eq_ignore_ascii_case("in")) {
        return None;
    }
    RESERVED
        .iter()
        .find(|r| base.eq_ignore_ascii_case(r))
        .copied()
}

fn parse_page_bound(key: &str, values: &[String]) -> Result<i64> {
    if values.len() != 1 {
        return Err(QueryError::BadFormat.with_key(key));
    }
    let raw = values[0].trim();
    if raw.is_empty() {
        return Err(QueryError::BadFormat.with_key(key));
    }
    raw.parse::<i64>()
        .map_err(|_| QueryError::BadFormat.with_key(key))
}

fn clean_list(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
