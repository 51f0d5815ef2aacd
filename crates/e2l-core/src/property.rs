//! Typed property values read from and written to engine objects

use crate::error::{BridgeError, Result};
use crate::value::Value;
use std::fmt;

/// Runtime value of a property on an entity or component
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Location, rotation or any other 3-component vector
    Vector([f64; 3]),
    /// Reference to another object, rendered as its string form
    Object(String),
    /// A type the bridge cannot put on the wire; carries the engine's type name
    Unsupported(String),
}

impl PropertyValue {
    /// Engine-facing type name
    pub fn type_name(&self) -> &str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Vector(_) => "vector",
            PropertyValue::Object(_) => "object",
            PropertyValue::Unsupported(name) => name,
        }
    }

    /// Convert to a wire value; `property` names the offender on failure
    pub fn to_wire(&self, property: &str) -> Result<Value> {
        match self {
            PropertyValue::Bool(b) => Ok(Value::Bool(*b)),
            PropertyValue::Int(i) => Ok(Value::Int(*i)),
            PropertyValue::Float(f) => Ok(Value::Float(*f)),
            PropertyValue::Vector(v) => Ok(Value::from(*v)),
            PropertyValue::Object(s) => Ok(Value::Str(s.clone())),
            PropertyValue::Unsupported(type_name) => Err(BridgeError::UnsupportedPropertyType {
                property: property.to_string(),
                type_name: type_name.clone(),
            }),
        }
    }

    /// Interpret a client-supplied wire value
    pub fn from_wire(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            Value::Int(i) => Ok(PropertyValue::Int(*i)),
            Value::Float(f) => Ok(PropertyValue::Float(*f)),
            Value::Str(s) => Ok(PropertyValue::Object(s.clone())),
            Value::Array(items) => {
                let components: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
                match components.as_deref() {
                    Some([x, y, z]) => Ok(PropertyValue::Vector([*x, *y, *z])),
                    _ => Err(BridgeError::malformed(format!(
                        "list value must hold exactly 3 numbers, got {} items",
                        items.len()
                    ))),
                }
            }
            other => Err(BridgeError::malformed(format!(
                "cannot assign a {} value to a property",
                other.type_name()
            ))),
        }
    }

    /// Convert `self` to the type of `current` so it can be stored in its place
    pub fn coerce_like(self, current: &PropertyValue) -> Result<Self> {
        match (current, self) {
            (PropertyValue::Float(_), PropertyValue::Int(i)) => Ok(PropertyValue::Float(i as f64)),
            (PropertyValue::Int(_), PropertyValue::Float(f)) => Ok(PropertyValue::Int(f as i64)),
            (PropertyValue::Unsupported(type_name), _) => Err(BridgeError::malformed(format!(
                "cannot assign to a property of unsupported type {}",
                type_name
            ))),
            (current, new) if std::mem::discriminant(current) == std::mem::discriminant(&new) => {
                Ok(new)
            }
            (current, new) => Err(BridgeError::malformed(format!(
                "cannot assign a {} value to a {} property",
                new.type_name(),
                current.type_name()
            ))),
        }
    }

    /// `self + delta`, as used by relative setters
    pub fn add(&self, delta: &PropertyValue) -> Result<Self> {
        match (self, delta) {
            (PropertyValue::Int(a), PropertyValue::Int(b)) => Ok(PropertyValue::Int(a.wrapping_add(*b))),
            (PropertyValue::Int(a), PropertyValue::Float(b)) => {
                Ok(PropertyValue::Int((*a as f64 + b) as i64))
            }
            (PropertyValue::Float(a), PropertyValue::Float(b)) => Ok(PropertyValue::Float(a + b)),
            (PropertyValue::Float(a), PropertyValue::Int(b)) => Ok(PropertyValue::Float(a + *b as f64)),
            (PropertyValue::Vector(a), PropertyValue::Vector(b)) => {
                Ok(PropertyValue::Vector([a[0] + b[0], a[1] + b[1], a[2] + b[2]]))
            }
            (current, delta) => Err(BridgeError::malformed(format!(
                "cannot add a {} value to a {} property",
                delta.type_name(),
                current.type_name()
            ))),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Vector([x, y, z]) => write!(f, "({}, {}, {})", x, y, z),
            PropertyValue::Object(s) => f.write_str(s),
            PropertyValue::Unsupported(t) => write!(f, "<{}>", t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_add() {
        let v = PropertyValue::Float(10.0);
        assert_eq!(v.add(&PropertyValue::Int(-3)).unwrap(), PropertyValue::Float(7.0));

        let v = PropertyValue::Vector([1.0, 2.0, 3.0]);
        assert_eq!(
            v.add(&PropertyValue::Vector([0.5, 0.5, -3.0])).unwrap(),
            PropertyValue::Vector([1.5, 2.5, 0.0])
        );

        assert!(PropertyValue::Bool(true).add(&PropertyValue::Bool(true)).is_err());
        assert!(PropertyValue::Object("a".into()).add(&PropertyValue::Object("b".into())).is_err());
    }

    #[test]
    fn test_from_wire() {
        assert_eq!(
            PropertyValue::from_wire(&Value::Array(vec![Value::Int(1), Value::Float(2.5), Value::Int(3)]))
                .unwrap(),
            PropertyValue::Vector([1.0, 2.5, 3.0])
        );
        assert!(PropertyValue::from_wire(&Value::Array(vec![Value::Int(1)])).is_err());
        assert!(PropertyValue::from_wire(&Value::Nil).is_err());
    }

    #[test]
    fn test_coerce_like() {
        let current = PropertyValue::Float(1.0);
        assert_eq!(
            PropertyValue::Int(4).coerce_like(&current).unwrap(),
            PropertyValue::Float(4.0)
        );
        assert!(PropertyValue::Bool(true).coerce_like(&current).is_err());
        assert_eq!(
            PropertyValue::Bool(false).coerce_like(&PropertyValue::Bool(true)).unwrap(),
            PropertyValue::Bool(false)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyValue::Vector([1.0, -2.5, 0.0]).to_string(), "(1, -2.5, 0)");
        assert_eq!(PropertyValue::Object("Door_1".into()).to_string(), "Door_1");
        assert_eq!(PropertyValue::Unsupported("Material".into()).to_string(), "<Material>");
    }

    #[test]
    fn test_unsupported_names_property() {
        let err = PropertyValue::Unsupported("Material".into())
            .to_wire("SkinMaterial")
            .unwrap_err();
        match err {
            BridgeError::UnsupportedPropertyType {
                property,
                type_name,
            } => {
                assert_eq!(property, "SkinMaterial");
                assert_eq!(type_name, "Material");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
