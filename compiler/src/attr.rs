// attr.rs — Node attribute values
//
// Attributes are a closed tagged variant so every read site matches
// exhaustively and a wrongly-shaped value surfaces as a malformed-IR error
// rather than a failed cast.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RearrangeError, Result};
use crate::types::{join_types, DataType};

/// Named attributes of a node or a function reference. Ordered so that
/// serialization and canonical keys are deterministic.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A function name plus the attribute values bound at the reference site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameAttrList {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: AttrMap,
}

impl NameAttrList {
    pub fn new(name: impl Into<String>) -> Self {
        NameAttrList {
            name: name.into(),
            attrs: AttrMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Canonical key for this reference (see [`canonicalize`]).
    pub fn canonical_key(&self) -> String {
        canonicalize(&self.name, &self.attrs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Int(i64),
    Str(String),
    Type(DataType),
    TypeList(Vec<DataType>),
    Func(NameAttrList),
    FuncList(Vec<NameAttrList>),
    /// Reference to an attribute bound by the caller at instantiation.
    Placeholder(String),
}

impl AttrValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Str(_) => "string",
            AttrValue::Type(_) => "type",
            AttrValue::TypeList(_) => "type list",
            AttrValue::Func(_) => "function",
            AttrValue::FuncList(_) => "function list",
            AttrValue::Placeholder(_) => "placeholder",
        }
    }

    /// Resolve placeholders (recursively through function references)
    /// against `bound`. `context` names the owner for error messages.
    pub fn substitute(&self, bound: &AttrMap, context: &str) -> Result<AttrValue> {
        match self {
            AttrValue::Placeholder(key) => bound.get(key).cloned().ok_or_else(|| {
                RearrangeError::malformed(context, format!("unbound placeholder '{}'", key))
            }),
            AttrValue::Func(func) => Ok(AttrValue::Func(substitute_func(func, bound, context)?)),
            AttrValue::FuncList(funcs) => Ok(AttrValue::FuncList(
                funcs
                    .iter()
                    .map(|f| substitute_func(f, bound, context))
                    .collect::<Result<_>>()?,
            )),
            other => Ok(other.clone()),
        }
    }
}

fn substitute_func(func: &NameAttrList, bound: &AttrMap, context: &str) -> Result<NameAttrList> {
    let mut attrs = AttrMap::new();
    for (key, value) in &func.attrs {
        attrs.insert(key.clone(), value.substitute(bound, context)?);
    }
    Ok(NameAttrList {
        name: func.name.clone(),
        attrs,
    })
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Str(s) => write!(f, "{:?}", s),
            AttrValue::Type(t) => write!(f, "{}", t),
            AttrValue::TypeList(ts) => write!(f, "types[{}]", join_types(ts)),
            AttrValue::Func(func) => write!(f, "{}", func.canonical_key()),
            AttrValue::FuncList(funcs) => {
                let keys: Vec<String> = funcs.iter().map(|x| x.canonical_key()).collect();
                write!(f, "funcs[{}]", keys.join(", "))
            }
            AttrValue::Placeholder(key) => write!(f, "${}", key),
        }
    }
}

/// Canonical key of a function instantiation: the name plus its bound
/// attributes in key order. Two references with equal keys instantiate the
/// same body.
pub fn canonicalize(name: &str, attrs: &AttrMap) -> String {
    if attrs.is_empty() {
        return name.to_string();
    }
    let parts: Vec<String> = attrs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}[{}]", name, parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_is_order_independent() {
        let mut a = AttrMap::new();
        a.insert("T".into(), AttrValue::Type(DataType::Float));
        a.insert("N".into(), AttrValue::Int(3));
        let mut b = AttrMap::new();
        b.insert("N".into(), AttrValue::Int(3));
        b.insert("T".into(), AttrValue::Type(DataType::Float));
        assert_eq!(canonicalize("f", &a), canonicalize("f", &b));
        assert_eq!(canonicalize("f", &a), "f[N=3,T=float]");
    }

    #[test]
    fn canonical_key_distinguishes_specializations() {
        let f32 = NameAttrList::new("f").with_attr("T", AttrValue::Type(DataType::Float));
        let i32 = NameAttrList::new("f").with_attr("T", AttrValue::Type(DataType::Int32));
        assert_ne!(f32.canonical_key(), i32.canonical_key());
        assert_eq!(NameAttrList::new("f").canonical_key(), "f");
    }

    #[test]
    fn canonical_key_separates_list_kinds() {
        let types = NameAttrList::new("f").with_attr("L", AttrValue::TypeList(vec![]));
        let funcs = NameAttrList::new("f").with_attr("L", AttrValue::FuncList(vec![]));
        assert_ne!(types.canonical_key(), funcs.canonical_key());

        let float_type = NameAttrList::new("f")
            .with_attr("L", AttrValue::TypeList(vec![DataType::Float]));
        let float_func = NameAttrList::new("f")
            .with_attr("L", AttrValue::FuncList(vec![NameAttrList::new("float")]));
        assert_eq!(float_type.canonical_key(), "f[L=types[float]]");
        assert_eq!(float_func.canonical_key(), "f[L=funcs[float]]");
    }

    #[test]
    fn substitute_resolves_nested_placeholders() {
        let mut bound = AttrMap::new();
        bound.insert("T".into(), AttrValue::Type(DataType::Resource));
        let value = AttrValue::Func(
            NameAttrList::new("g").with_attr("T", AttrValue::Placeholder("T".into())),
        );
        let resolved = value.substitute(&bound, "node").unwrap();
        assert_eq!(
            resolved,
            AttrValue::Func(
                NameAttrList::new("g").with_attr("T", AttrValue::Type(DataType::Resource))
            )
        );
    }

    #[test]
    fn substitute_reports_unbound_placeholder() {
        let err = AttrValue::Placeholder("T".into())
            .substitute(&AttrMap::new(), "n")
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedIr);
    }

    #[test]
    fn serde_shape_is_tagged() {
        let v = AttrValue::TypeList(vec![DataType::Float, DataType::Resource]);
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            r#"{"type_list":["float","resource"]}"#
        );
    }
}
