//! Wire protocol shared by both nodes
//!
//! Command channel: `{"op": "<Operation>", "d": {..}}`.
//! Feedback channel: `{"x":..,"y":..,"z":..}` or `null`.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Operations understood by the actuator node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Move,
    Pick,
    Aspirate,
    Dispense,
    Eject,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Move,
        Operation::Pick,
        Operation::Aspirate,
        Operation::Dispense,
        Operation::Eject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Move => "Move",
            Operation::Pick => "Pick",
            Operation::Aspirate => "Aspirate",
            Operation::Dispense => "Dispense",
            Operation::Eject => "Eject",
        }
    }

    /// Exact (case-sensitive) lookup by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deck coordinate
///
/// Peers may send coordinates as JSON floats; whole values such as `110.0`
/// are accepted, fractional ones are malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(deserialize_with = "whole_number")]
    pub x: i32,
    #[serde(deserialize_with = "whole_number")]
    pub y: i32,
    #[serde(deserialize_with = "whole_number")]
    pub z: i32,
}

fn whole_number<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(de::Error::custom(format!("coordinate {} is not a whole number in range", value)));
    }
    Ok(value as i32)
}

impl Point {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Protocol decoding failures
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
}

/// Unit on the command channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub op: Operation,
    #[serde(default = "empty_data")]
    pub d: Value,
}

fn empty_data() -> Value {
    Value::Object(Map::new())
}

/// Optional volume carried by aspirate/dispense commands
#[derive(Debug, Default, Deserialize)]
struct VolumeData {
    #[serde(default)]
    volume: Option<f64>,
}

/// Loosely typed envelope so unknown operations can be told apart from bad JSON
#[derive(Deserialize)]
struct RawCommand {
    op: String,
    #[serde(default)]
    d: Option<Value>,
}

/// Typed form of a decoded command
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Move(Point),
    Pick,
    Aspirate { volume: Option<f64> },
    Dispense { volume: Option<f64> },
    Eject,
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::Move(_) => Operation::Move,
            Request::Pick => Operation::Pick,
            Request::Aspirate { .. } => Operation::Aspirate,
            Request::Dispense { .. } => Operation::Dispense,
            Request::Eject => Operation::Eject,
        }
    }
}

impl Command {
    /// Action command with an empty payload
    pub fn action(op: Operation) -> Self {
        Self { op, d: empty_data() }
    }

    /// Navigation move to `point`
    pub fn move_to(point: Point) -> Self {
        Self {
            op: Operation::Move,
            d: serde_json::json!({ "x": point.x, "y": point.y, "z": point.z }),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        // Serializing a derived struct holding a `Value` cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode a command channel payload into a typed request
    pub fn decode(payload: &[u8]) -> Result<Request, ProtocolError> {
        let raw: RawCommand = serde_json::from_slice(payload)?;
        let op = Operation::from_name(&raw.op)
            .ok_or_else(|| ProtocolError::UnknownOperation(raw.op.clone()))?;
        let data = match raw.d {
            None | Some(Value::Null) => empty_data(),
            Some(d) => d,
        };

        let request = match op {
            Operation::Move => Request::Move(serde_json::from_value(data)?),
            Operation::Pick => Request::Pick,
            Operation::Eject => Request::Eject,
            Operation::Aspirate => {
                let v: VolumeData = serde_json::from_value(data)?;
                Request::Aspirate { volume: v.volume }
            }
            Operation::Dispense => {
                let v: VolumeData = serde_json::from_value(data)?;
                Request::Dispense { volume: v.volume }
            }
        };
        Ok(request)
    }
}

/// Unit on the feedback channel; `None` serializes as `null`
pub type Feedback = Option<Point>;

pub fn encode_feedback(feedback: &Feedback) -> Vec<u8> {
    serde_json::to_vec(feedback).unwrap_or_else(|_| b"null".to_vec())
}

pub fn decode_feedback(payload: &[u8]) -> Result<Feedback, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}
