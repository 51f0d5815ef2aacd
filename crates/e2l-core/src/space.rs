//! Action and observation space descriptors

use crate::error::{BridgeError, Result};
use crate::value::{Value, ValueMap};
use std::collections::BTreeMap;

/// Action-space descriptor: input name -> binding description
pub type ActionSpaceDesc = BTreeMap<String, ActionDesc>;

/// Observation-space descriptor: observation key -> shape/type
pub type ObservationSpaceDesc = BTreeMap<String, SpaceDesc>;

/// Description of one named input
#[derive(Debug, Clone, PartialEq)]
pub enum ActionDesc {
    /// Press/release action with every key bound to it
    Action { keys: Vec<String> },
    /// Continuous axis with `(key, scale)` per binding
    Axis { keys: Vec<(String, f64)> },
}

impl ActionDesc {
    pub fn to_value(&self) -> Value {
        match self {
            ActionDesc::Action { keys } => Value::map([
                ("type", Value::from("action")),
                (
                    "keys",
                    Value::Array(keys.iter().map(|k| Value::from(k.as_str())).collect()),
                ),
            ]),
            ActionDesc::Axis { keys } => Value::map([
                ("type", Value::from("axis")),
                (
                    "keys",
                    Value::Array(
                        keys.iter()
                            .map(|(k, scale)| {
                                Value::Array(vec![Value::from(k.as_str()), Value::Float(*scale)])
                            })
                            .collect(),
                    ),
                ),
            ]),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::malformed("action descriptor without 'type'"))?;
        let keys = value
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| BridgeError::malformed("action descriptor without 'keys'"))?;
        match kind {
            "action" => {
                let keys = keys
                    .iter()
                    .map(|k| k.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| BridgeError::malformed("action keys must be strings"))?;
                Ok(ActionDesc::Action { keys })
            }
            "axis" => {
                let keys = keys
                    .iter()
                    .map(|pair| match pair.as_array() {
                        Some([key, scale]) => Some((key.as_str()?.to_string(), scale.as_f64()?)),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| BridgeError::malformed("axis keys must be (key, scale) pairs"))?;
                Ok(ActionDesc::Axis { keys })
            }
            other => Err(BridgeError::malformed(format!(
                "unknown action descriptor type: {}",
                other
            ))),
        }
    }
}

/// Shape/type of one observation entry
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceDesc {
    /// Integer box, optionally bounded (camera images are `0..=255`)
    IntBox {
        shape: Vec<usize>,
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Unbounded continuous values; bounds are left to the client to estimate
    Continuous { shape: Vec<usize> },
    Bool,
    /// String-rendered object references
    Str,
}

impl SpaceDesc {
    /// Descriptor for a `(width, height, 3)` camera image
    pub fn camera(width: u32, height: u32) -> Self {
        SpaceDesc::IntBox {
            shape: vec![width as usize, height as usize, 3],
            min: Some(0),
            max: Some(255),
        }
    }

    pub fn to_value(&self) -> Value {
        let shape = |shape: &[usize]| Value::Array(shape.iter().map(|d| Value::from(*d)).collect());
        let mut map = ValueMap::new();
        match self {
            SpaceDesc::IntBox { shape: dims, min, max } => {
                map.insert("type".into(), Value::from("IntBox"));
                map.insert("shape".into(), shape(dims));
                if let Some(min) = min {
                    map.insert("min".into(), Value::Int(*min));
                }
                if let Some(max) = max {
                    map.insert("max".into(), Value::Int(*max));
                }
            }
            SpaceDesc::Continuous { shape: dims } => {
                map.insert("type".into(), Value::from("Continuous"));
                map.insert("shape".into(), shape(dims));
            }
            SpaceDesc::Bool => {
                map.insert("type".into(), Value::from("Bool"));
            }
            SpaceDesc::Str => {
                map.insert("type".into(), Value::from("str"));
            }
        }
        Value::Map(map)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::malformed("space descriptor without 'type'"))?;
        let shape = || -> Result<Vec<usize>> {
            value
                .get("shape")
                .and_then(Value::as_array)
                .and_then(|dims| {
                    dims.iter()
                        .map(|d| d.as_i64().and_then(|d| usize::try_from(d).ok()))
                        .collect::<Option<Vec<_>>>()
                })
                .ok_or_else(|| BridgeError::malformed("space descriptor with invalid 'shape'"))
        };
        match kind {
            "IntBox" => Ok(SpaceDesc::IntBox {
                shape: shape()?,
                min: value.get("min").and_then(Value::as_i64),
                max: value.get("max").and_then(Value::as_i64),
            }),
            "Continuous" => Ok(SpaceDesc::Continuous { shape: shape()? }),
            "Bool" => Ok(SpaceDesc::Bool),
            "str" => Ok(SpaceDesc::Str),
            other => Err(BridgeError::malformed(format!(
                "unknown space descriptor type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_descriptor_wire_shape() {
        let desc = ActionDesc::Axis {
            keys: vec![("W".into(), 1.0), ("S".into(), -1.0)],
        };
        let value = desc.to_value();
        assert_eq!(value.get("type").and_then(Value::as_str), Some("axis"));
        let keys = value.get("keys").and_then(Value::as_array).unwrap();
        assert_eq!(
            keys[1],
            Value::Array(vec![Value::from("S"), Value::Float(-1.0)])
        );
        assert_eq!(ActionDesc::from_value(&value).unwrap(), desc);
    }

    #[test]
    fn test_camera_descriptor() {
        let value = SpaceDesc::camera(84, 64).to_value();
        assert_eq!(value.get("type").and_then(Value::as_str), Some("IntBox"));
        assert_eq!(value.get("min"), Some(&Value::Int(0)));
        assert_eq!(value.get("max"), Some(&Value::Int(255)));
        assert_eq!(
            value.get("shape"),
            Some(&Value::Array(vec![Value::Int(84), Value::Int(64), Value::Int(3)]))
        );
    }

    #[test]
    fn test_unbounded_int_box_has_no_bounds() {
        let value = SpaceDesc::IntBox {
            shape: vec![1],
            min: None,
            max: None,
        }
        .to_value();
        assert!(value.get("min").is_none());
        assert_eq!(SpaceDesc::from_value(&value).unwrap(), SpaceDesc::IntBox {
            shape: vec![1],
            min: None,
            max: None,
        });
    }

    #[test]
    fn test_unknown_type_rejected() {
        let value = Value::map([("type", Value::from("Tensor"))]);
        assert!(SpaceDesc::from_value(&value).is_err());
    }
}
