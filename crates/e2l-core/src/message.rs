//! Request and response messages
//!
//! Requests are maps with a `cmd` field plus command-specific fields.
//! Responses are maps with a `status` field (`ok` or `error`) plus either
//! `message` or the command's result fields.

use crate::error::{BridgeError, Result};
use crate::space::{ActionDesc, ActionSpaceDesc, ObservationSpaceDesc, SpaceDesc};
use crate::value::{Value, ValueMap};

/// Parameters of a `step` command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepRequest {
    /// Fixed time advanced per tick; server default when absent
    pub delta_time: Option<f64>,
    /// Ticks to run; server default when absent
    pub num_ticks: Option<u32>,
    /// `(key, value)` axis inputs
    pub axes: Vec<(String, f64)>,
    /// `(key, pressed)` action inputs
    pub actions: Vec<(String, bool)>,
}

/// One entry of a `set` command
#[derive(Debug, Clone, PartialEq)]
pub struct Setter {
    /// `entity[:component...]:property` addressing expression
    pub path: String,
    pub value: Value,
    /// Add `value` to the current value instead of overwriting it
    pub relative: bool,
}

impl Setter {
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            relative: false,
        }
    }

    pub fn relative(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            relative: true,
            ..Self::new(path, value)
        }
    }
}

/// A decoded request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Step(StepRequest),
    Reset,
    Seed(i64),
    Set(Vec<Setter>),
    GetSpec,
}

impl Command {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Step(_) => "step",
            Command::Reset => "reset",
            Command::Seed(_) => "seed",
            Command::Set(_) => "set",
            Command::GetSpec => "get_spec",
        }
    }

    /// Validate and decode a request message
    pub fn parse(message: &Value) -> Result<Self> {
        let fields = message
            .as_map()
            .ok_or_else(|| BridgeError::malformed("message must be a map"))?;
        let cmd = match fields.get("cmd") {
            None => return Err(BridgeError::malformed("Field 'cmd' missing in message!")),
            Some(Value::Str(cmd)) => cmd.as_str(),
            Some(other) => {
                return Err(BridgeError::malformed(format!(
                    "Field 'cmd' must be a string, got {}",
                    other.type_name()
                )));
            }
        };

        match cmd {
            "step" => parse_step(fields).map(Command::Step),
            "reset" => Ok(Command::Reset),
            "seed" => parse_seed(fields).map(Command::Seed),
            "set" => parse_setters(fields).map(Command::Set),
            "get_spec" => Ok(Command::GetSpec),
            other => Err(BridgeError::UnknownCommand(other.to_string())),
        }
    }

    /// Encode as a request message
    pub fn to_value(&self) -> Value {
        let mut map = ValueMap::new();
        map.insert("cmd".into(), Value::from(self.name()));
        match self {
            Command::Step(step) => {
                if let Some(dt) = step.delta_time {
                    map.insert("delta_time".into(), Value::Float(dt));
                }
                if let Some(n) = step.num_ticks {
                    map.insert("num_ticks".into(), Value::from(n));
                }
                if !step.axes.is_empty() {
                    let axes = step
                        .axes
                        .iter()
                        .map(|(k, v)| Value::Array(vec![Value::from(k.as_str()), Value::Float(*v)]))
                        .collect();
                    map.insert("axes".into(), Value::Array(axes));
                }
                if !step.actions.is_empty() {
                    let actions = step
                        .actions
                        .iter()
                        .map(|(k, p)| Value::Array(vec![Value::from(k.as_str()), Value::Bool(*p)]))
                        .collect();
                    map.insert("actions".into(), Value::Array(actions));
                }
            }
            Command::Seed(value) => {
                map.insert("value".into(), Value::Int(*value));
            }
            Command::Set(setters) => {
                let setters = setters
                    .iter()
                    .map(|s| {
                        let mut entry = vec![Value::from(s.path.as_str()), s.value.clone()];
                        if s.relative {
                            entry.push(Value::Bool(true));
                        }
                        Value::Array(entry)
                    })
                    .collect();
                map.insert("setters".into(), Value::Array(setters));
            }
            Command::Reset | Command::GetSpec => {}
        }
        Value::Map(map)
    }
}

fn parse_step(fields: &ValueMap) -> Result<StepRequest> {
    let delta_time = match fields.get("delta_time") {
        None | Some(Value::Nil) => None,
        Some(v) => match v.as_f64() {
            Some(dt) if dt.is_finite() && dt > 0.0 => Some(dt),
            _ => {
                return Err(BridgeError::malformed(
                    "Field 'delta_time' in 'step' command must be a positive number!",
                ));
            }
        },
    };
    let num_ticks = match fields.get("num_ticks") {
        None | Some(Value::Nil) => None,
        Some(v) => match v.as_i64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                return Err(BridgeError::malformed(
                    "Field 'num_ticks' in 'step' command must be a non-negative int!",
                ));
            }
        },
    };

    let axes = parse_pairs(fields, "axes", |v| v.as_f64())?;
    let actions = parse_pairs(fields, "actions", |v| match v {
        Value::Bool(b) => Some(*b),
        Value::Int(i) => Some(*i != 0),
        _ => None,
    })?;

    Ok(StepRequest {
        delta_time,
        num_ticks,
        axes,
        actions,
    })
}

/// Parse a list of `[name, value]` pairs
fn parse_pairs<T>(
    fields: &ValueMap,
    field: &str,
    convert: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<(String, T)>> {
    let items = match fields.get(field) {
        None | Some(Value::Nil) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(BridgeError::malformed(format!(
                "Field '{}' in 'step' command must be a list, got {}",
                field,
                other.type_name()
            )));
        }
    };

    items
        .iter()
        .map(|item| match item.as_array() {
            Some([Value::Str(name), value]) => convert(value)
                .map(|v| (name.clone(), v))
                .ok_or_else(|| {
                    BridgeError::malformed(format!(
                        "Entry for '{}' in '{}' has a value of wrong type ({})",
                        name,
                        field,
                        value.type_name()
                    ))
                }),
            _ => Err(BridgeError::malformed(format!(
                "Entries of '{}' must be [name, value] pairs",
                field
            ))),
        })
        .collect()
}

fn parse_seed(fields: &ValueMap) -> Result<i64> {
    match fields.get("value") {
        None => Err(BridgeError::malformed(
            "Field 'value' missing in 'seed' command message!",
        )),
        Some(Value::Int(i)) => Ok(*i),
        Some(Value::Float(f)) if f.is_finite() => Ok(*f as i64),
        Some(other) => Err(BridgeError::malformed(format!(
            "Field 'value' ({:?}) in 'seed' command is not of type int!",
            other
        ))),
    }
}

fn parse_setters(fields: &ValueMap) -> Result<Vec<Setter>> {
    let entries = match fields.get("setters") {
        None => {
            return Err(BridgeError::malformed(
                "Field 'setters' missing in 'set' command message!",
            ));
        }
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(BridgeError::malformed(format!(
                "Field 'setters' must be a list, got {}",
                other.type_name()
            )));
        }
    };

    entries
        .iter()
        .map(|entry| {
            let malformed = || {
                BridgeError::malformed(format!(
                    "Malformatted setter command {:?}. Needs to be ([actor:prop], [value][, is_relative]?).",
                    entry
                ))
            };
            let (path, value, relative) = match entry.as_array() {
                Some([path, value]) => (path, value, None),
                Some([path, value, relative]) => (path, value, Some(relative)),
                _ => return Err(malformed()),
            };
            let path = path.as_str().ok_or_else(malformed)?;
            let relative = match relative {
                None | Some(Value::Nil) => false,
                Some(Value::Bool(b)) => *b,
                Some(Value::Int(i)) => *i != 0,
                Some(_) => return Err(malformed()),
            };
            Ok(Setter {
                path: path.to_string(),
                value: value.clone(),
                relative,
            })
        })
        .collect()
}

/// A response to one request
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `{status: ok, obs_dict}` after `step`, `reset` and `set`
    Observation(Value),
    /// `{status: ok, new_seed}`
    Seeded { new_seed: i64 },
    /// `{status: ok, action_space_desc, observation_space_desc}`
    Spec {
        action_space: ActionSpaceDesc,
        observation_space: ObservationSpaceDesc,
    },
    /// `{status: error, message}`
    Error { message: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Response::Error { .. })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Response::Observation(obs) => Value::map([
                ("status", Value::from("ok")),
                ("obs_dict", obs.clone()),
            ]),
            Response::Seeded { new_seed } => Value::map([
                ("status", Value::from("ok")),
                ("new_seed", Value::Int(*new_seed)),
            ]),
            Response::Spec {
                action_space,
                observation_space,
            } => Value::map([
                ("status", Value::from("ok")),
                (
                    "action_space_desc",
                    Value::Map(
                        action_space
                            .iter()
                            .map(|(k, d)| (k.clone(), d.to_value()))
                            .collect(),
                    ),
                ),
                (
                    "observation_space_desc",
                    Value::Map(
                        observation_space
                            .iter()
                            .map(|(k, d)| (k.clone(), d.to_value()))
                            .collect(),
                    ),
                ),
            ]),
            Response::Error { message } => Value::map([
                ("status", Value::from("error")),
                ("message", Value::from(message.as_str())),
            ]),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::malformed("response without 'status'"))?;
        if status == "error" {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Ok(Response::error(message));
        }
        if status != "ok" {
            return Err(BridgeError::malformed(format!("unknown status: {}", status)));
        }

        if let Some(obs) = value.get("obs_dict") {
            return Ok(Response::Observation(obs.clone()));
        }
        if let Some(seed) = value.get("new_seed") {
            let new_seed = seed
                .as_i64()
                .ok_or_else(|| BridgeError::malformed("'new_seed' must be an int"))?;
            return Ok(Response::Seeded { new_seed });
        }
        if let (Some(actions), Some(observations)) = (
            value.get("action_space_desc").and_then(Value::as_map),
            value.get("observation_space_desc").and_then(Value::as_map),
        ) {
            let action_space: ActionSpaceDesc = actions
                .iter()
                .map(|(k, v)| Ok((k.clone(), ActionDesc::from_value(v)?)))
                .collect::<Result<_>>()?;
            let observation_space: ObservationSpaceDesc = observations
                .iter()
                .map(|(k, v)| Ok((k.clone(), SpaceDesc::from_value(v)?)))
                .collect::<Result<_>>()?;
            return Ok(Response::Spec {
                action_space,
                observation_space,
            });
        }
        Err(BridgeError::malformed("response has no recognizable payload"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(entries: Vec<(&str, Value)>) -> Value {
        Value::map(entries)
    }

    #[test]
    fn test_missing_cmd() {
        let err = Command::parse(&request(vec![("value", Value::Int(1))])).unwrap_err();
        assert!(err.to_string().contains("'cmd' missing"));
    }

    #[test]
    fn test_unknown_cmd() {
        let err = Command::parse(&request(vec![("cmd", Value::from("fly"))])).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownCommand(ref c) if c == "fly"));
    }

    #[test]
    fn test_step_defaults_and_inputs() {
        let cmd = Command::parse(&request(vec![
            ("cmd", Value::from("step")),
            (
                "axes",
                Value::Array(vec![Value::Array(vec![Value::from("MoveForward"), Value::Int(1)])]),
            ),
            (
                "actions",
                Value::Array(vec![Value::Array(vec![Value::from("Fire"), Value::Bool(true)])]),
            ),
        ]))
        .unwrap();
        let Command::Step(step) = cmd else {
            panic!("expected step");
        };
        assert_eq!(step.delta_time, None);
        assert_eq!(step.num_ticks, None);
        assert_eq!(step.axes, vec![("MoveForward".to_string(), 1.0)]);
        assert_eq!(step.actions, vec![("Fire".to_string(), true)]);
    }

    #[test]
    fn test_step_rejects_bad_ticks() {
        let result = Command::parse(&request(vec![
            ("cmd", Value::from("step")),
            ("num_ticks", Value::Int(-1)),
        ]));
        assert!(matches!(result, Err(BridgeError::MalformedRequest(_))));
    }

    #[test]
    fn test_seed_validation() {
        let ok = Command::parse(&request(vec![
            ("cmd", Value::from("seed")),
            ("value", Value::Float(42.9)),
        ]))
        .unwrap();
        assert_eq!(ok, Command::Seed(42));

        let missing = Command::parse(&request(vec![("cmd", Value::from("seed"))])).unwrap_err();
        assert!(missing.to_string().contains("'value' missing"));

        let wrong = Command::parse(&request(vec![
            ("cmd", Value::from("seed")),
            ("value", Value::from("abc")),
        ]))
        .unwrap_err();
        assert!(wrong.to_string().contains("not of type int"));
    }

    #[test]
    fn test_setters_shape() {
        let cmd = Command::parse(&request(vec![
            ("cmd", Value::from("set")),
            (
                "setters",
                Value::Array(vec![
                    Value::Array(vec![Value::from("Wall.*:Health"), Value::Int(5)]),
                    Value::Array(vec![Value::from("Door:Open"), Value::Bool(true), Value::Bool(true)]),
                ]),
            ),
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::Set(vec![
                Setter::new("Wall.*:Health", 5i64),
                Setter::relative("Door:Open", true),
            ])
        );

        let bad = Command::parse(&request(vec![
            ("cmd", Value::from("set")),
            ("setters", Value::Array(vec![Value::Array(vec![Value::from("x")])])),
        ]));
        assert!(matches!(bad, Err(BridgeError::MalformedRequest(_))));
    }

    #[test]
    fn test_command_encoding_parses_back() {
        let cmd = Command::Step(StepRequest {
            delta_time: Some(0.05),
            num_ticks: Some(2),
            axes: vec![("Turn".into(), -0.5)],
            actions: vec![("Jump".into(), false)],
        });
        assert_eq!(Command::parse(&cmd.to_value()).unwrap(), cmd);
    }

    #[test]
    fn test_error_response() {
        let value = Response::error("No playing world!").to_value();
        assert_eq!(value.get("status").and_then(Value::as_str), Some("error"));
        assert_eq!(
            Response::from_value(&value).unwrap(),
            Response::error("No playing world!")
        );
    }

    #[test]
    fn test_spec_response_decodes() {
        let mut action_space = ActionSpaceDesc::new();
        action_space.insert("Fire".into(), ActionDesc::Action {
            keys: vec!["SpaceBar".into(), "LeftMouseButton".into()],
        });
        let mut observation_space = ObservationSpaceDesc::new();
        observation_space.insert("Eye:camera".into(), SpaceDesc::camera(86, 86));
        let response = Response::Spec {
            action_space,
            observation_space,
        };
        assert_eq!(Response::from_value(&response.to_value()).unwrap(), response);
    }
}
