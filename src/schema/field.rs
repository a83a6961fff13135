//! Field metadata — declared name and type for one column/attribute

use serde::{Deserialize, Serialize};

/// Declared type of a field, used both for write-payload coercion and for
/// decoding driver-returned row values into the matching host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Uuid,
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Uuid => "uuid",
            FieldType::Json => "json",
        };
        write!(f, "{}", name)
    }
}

/// Name plus declared type for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    pub field_type: FieldType,
    /// Required fields must be present in every create payload.
    pub required: bool,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Mark the field as mandatory in create payloads.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_meta_defaults_to_optional() {
        let meta = FieldMeta::new("name", FieldType::Text);
        assert_eq!(meta.name, "name");
        assert_eq!(meta.field_type, FieldType::Text);
        assert!(!meta.required);
        assert!(FieldMeta::new("serial", FieldType::Text).required().required);
    }

    #[test]
    fn field_type_display() {
        assert_eq!(FieldType::DateTime.to_string(), "datetime");
        assert_eq!(FieldType::Uuid.to_string(), "uuid");
    }
}
