//! Dynamic values held in blueprint variables and module settings.

use std::fmt;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Number;

use crate::path::BpPath;
use crate::usemark::UseMark;

/// Ordered string-keyed dictionary of values.
pub type Dict = IndexMap<String, Value>;

/// A dynamically typed value.
///
/// `Unknown` stands for a value that is only known at deploy time (module
/// outputs). `Marked` wraps a value together with its provenance mark; marks
/// are never introduced implicitly, only by [`crate::usemark::mark`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Unknown,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Object(Dict),
    Marked(Box<Marked>),
}

/// A value paired with the modules that contributed to it via `use`.
#[derive(Debug, Clone, PartialEq)]
pub struct Marked {
    pub value: Value,
    pub mark: UseMark,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build a number, preferring an integer representation when exact.
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            Value::Number(Number::from(n as i64))
        } else {
            Value::Number(Number::from(n))
        }
    }

    pub fn int(n: i64) -> Self {
        Value::Number(Number::from(n))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The value with all provenance marks peeled off the top.
    pub fn unmarked(&self) -> &Value {
        match self {
            Value::Marked(m) => m.value.unmarked(),
            v => v,
        }
    }

    /// A copy of the value with every mark in the tree removed.
    pub fn strip_marks(&self) -> Value {
        match self {
            Value::Marked(m) => m.value.strip_marks(),
            Value::List(items) => Value::List(items.iter().map(Value::strip_marks).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.strip_marks()))
                    .collect(),
            ),
            v => v.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unknown => "unknown",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Marked(m) => m.value.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.unmarked(), Value::Null)
    }

    /// True if the value or any nested value is unknown.
    pub fn is_unknown(&self) -> bool {
        match self {
            Value::Unknown => true,
            Value::Marked(m) => m.value.is_unknown(),
            Value::List(items) => items.iter().any(Value::is_unknown),
            Value::Object(map) => map.values().any(Value::is_unknown),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unmarked() {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.unmarked() {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.unmarked() {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self.unmarked() {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Dict> {
        match self.unmarked() {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Visit every node of the value tree, depth first, with its relative path.
    ///
    /// Marked values are visited once as themselves and once more as their
    /// inner value at the same path.
    pub fn walk<F>(&self, f: &mut F)
    where
        F: FnMut(&BpPath, &Value),
    {
        self.walk_at(&BpPath::root(), f);
    }

    fn walk_at<F>(&self, path: &BpPath, f: &mut F)
    where
        F: FnMut(&BpPath, &Value),
    {
        f(path, self);
        match self {
            Value::Marked(m) => m.value.walk_at(path, f),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.walk_at(&path.at(i), f);
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    v.walk_at(&path.dot(k.as_str()), f);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Unknown => f.write_str("(unknown)"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Marked(m) => write!(f, "{}", m.value),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl TryFrom<serde_yaml::Value> for Value {
    type Error = String;

    fn try_from(raw: serde_yaml::Value) -> Result<Self, Self::Error> {
        use serde_yaml::Value as Y;
        Ok(match raw {
            Y::Null => Value::Null,
            Y::Bool(b) => Value::Bool(b),
            Y::Number(n) => Value::Number(n),
            Y::String(s) => Value::String(s),
            Y::Sequence(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Y::Mapping(mapping) => {
                let mut map = Dict::with_capacity(mapping.len());
                for (k, v) in mapping {
                    let key = match k {
                        Y::String(s) => s,
                        Y::Number(n) => n.to_string(),
                        Y::Bool(b) => b.to_string(),
                        other => return Err(format!("unsupported mapping key {:?}", other)),
                    };
                    map.insert(key, Value::try_from(v)?);
                }
                Value::Object(map)
            }
            Y::Tagged(tagged) => Value::try_from(tagged.value)?,
        })
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Unknown => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Value::Marked(m) => m.value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        Value::try_from(raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usemark;

    #[test]
    fn test_yaml_round_trip_keeps_order() {
        let yaml = "zone: us-central1-a\ncount: 3\nflags:\n  - true\n  - 1.5\nnested:\n  b: 1\n  a: null\n";
        let v: Value = serde_yaml::from_str(yaml).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.keys().collect::<Vec<_>>(), vec!["zone", "count", "flags", "nested"]);

        let again: Value = serde_yaml::from_str(&serde_yaml::to_string(&v).unwrap()).unwrap();
        assert_eq!(again, v);
    }

    #[test]
    fn test_number_prefers_integers() {
        assert_eq!(Value::number(4.0), Value::int(4));
        assert_eq!(Value::number(2.5).as_f64(), Some(2.5));
    }

    #[test]
    fn test_marks_are_not_serialized() {
        let v = usemark::mark(Value::string("$(net.network_name)"), ["net".into()]);
        assert_eq!(serde_yaml::to_string(&v).unwrap().trim(), "$(net.network_name)");
        assert_eq!(v.as_str(), Some("$(net.network_name)"));
        assert_eq!(v.type_name(), "string");
    }

    #[test]
    fn test_walk_visits_nested_paths() {
        let v = Value::object([(
            "a",
            Value::list([Value::int(1), Value::object([("b", Value::Unknown)])]),
        )]);
        let mut seen = Vec::new();
        v.walk(&mut |p, _| seen.push(p.to_string()));
        assert_eq!(seen, vec!["", "a", "a[0]", "a[1]", "a[1].b"]);
        assert!(v.is_unknown());
    }
}
