use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Declared value type of a filterable field. Drives which comparison
/// methods a value may use and how nested names resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    Float,
    Bool,
    Str,
    Time,
    IntArray,
    FloatArray,
    StringArray,
    Json,
    Object,
    Custom,
}

impl FieldType {
    /// Recognize a `:type` tag from a validation declaration key
    /// (e.g. the `int` in `"id:int"`). `required` is a modifier, not a type.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "str" | "string" => Some(Self::Str),
            "time" => Some(Self::Time),
            "int_array" => Some(Self::IntArray),
            "float_array" => Some(Self::FloatArray),
            "string_array" => Some(Self::StringArray),
            "json" => Some(Self::Json),
            "object" => Some(Self::Object),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub const fn is_array(self) -> bool {
        matches!(self, Self::IntArray | Self::FloatArray | Self::StringArray)
    }
}

/// Where a filterable field physically lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Physical column or expression head.
    pub db_name: String,
    /// Owning table/source, when several sources share one query.
    pub source: Option<String>,
    pub kind: FieldType,
    /// Whether dotted access below this field is meaningful.
    pub nested: bool,
}

impl FieldDescriptor {
    pub fn new(db_name: &str, kind: FieldType) -> Self {
        Self {
            db_name: db_name.to_string(),
            source: None,
            kind,
            nested: false,
        }
    }

    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }

    pub fn from_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

/// Registry mapping query-facing names to field descriptors. Immutable once
/// handed to a session; lookups only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable registration, used at construction time.
    pub fn with(mut self, query_name: &str, desc: FieldDescriptor) -> Self {
        self.fields.insert(query_name.to_string(), desc);
        self
    }

    pub fn get(&self, query_name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(query_name)
    }

    pub fn kind(&self, query_name: &str) -> Option<FieldType> {
        self.fields.get(query_name).map(|d| d.kind)
    }

    /// Translate a query-facing (possibly dotted) name into the expression
    /// the backend filters/sorts/selects on. See [`crate::resolve`].
    pub fn resolve(&self, query_name: &str) -> String {
        crate::resolve::resolve(self, query_name)
    }
}
