// types.rs — Value types carried on dataflow edges
//
// The pass only distinguishes resource handles from everything else, but the
// full set is kept so serialized programs round-trip without loss.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a value flowing along a data edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float,
    Double,
    Half,
    Int32,
    Int64,
    Bool,
    String,
    Variant,
    /// Handle to mutable external state (e.g. a variable).
    Resource,
}

impl DataType {
    pub fn is_resource(self) -> bool {
        self == DataType::Resource
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Half => "half",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Bool => "bool",
            DataType::String => "string",
            DataType::Variant => "variant",
            DataType::Resource => "resource",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a type list as `float, resource, ...` (no brackets).
pub fn join_types(types: &[DataType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resource_is_resource() {
        assert!(DataType::Resource.is_resource());
        assert!(!DataType::Variant.is_resource());
        assert!(!DataType::Float.is_resource());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&vec![DataType::Int32, DataType::Resource]).unwrap();
        assert_eq!(json, r#"["int32","resource"]"#);
        let back: Vec<DataType> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![DataType::Int32, DataType::Resource]);
    }

    #[test]
    fn join_types_formats_list() {
        assert_eq!(join_types(&[]), "");
        assert_eq!(
            join_types(&[DataType::Float, DataType::Resource]),
            "float, resource"
        );
    }
}
