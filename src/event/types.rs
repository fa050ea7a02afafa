use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A point on the disaster-zone grid, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location(pub f64, pub f64);

impl Location {
    pub fn x(&self) -> f64 {
        self.0
    }

    pub fn y(&self) -> f64 {
        self.1
    }

    pub fn is_finite(&self) -> bool {
        self.0.is_finite() && self.1.is_finite()
    }

    /// One movement step toward `target`: at most one unit per axis,
    /// landing exactly on the target coordinate once within reach.
    pub fn step_toward(&self, target: Location) -> Location {
        fn axis(from: f64, to: f64) -> f64 {
            let delta = to - from;
            if delta.abs() <= 1.0 {
                to
            } else {
                from + delta.signum()
            }
        }
        Location(axis(self.0, target.0), axis(self.1, target.1))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl From<(f64, f64)> for Location {
    fn from((x, y): (f64, f64)) -> Self {
        Self(x, y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// Raw observation handed in by a sensor (or a scenario file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReport {
    pub sensor_id: String,
    pub reading_kind: String,
    pub location: Location,
    #[serde(default)]
    pub attributes: Attributes,
}

impl SensorReport {
    pub fn new(
        sensor_id: impl Into<String>,
        reading_kind: impl Into<String>,
        location: impl Into<Location>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            reading_kind: reading_kind.into(),
            location: location.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    StructuralCollapse,
    StructuralDamage,
    Earthquake,
    MajorEarthquake,
    Fire,
    GasLeak,
    MedicalEmergency,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuralCollapse => "structural-collapse",
            Self::StructuralDamage => "structural-damage",
            Self::Earthquake => "earthquake",
            Self::MajorEarthquake => "major-earthquake",
            Self::Fire => "fire",
            Self::GasLeak => "gas-leak",
            Self::MedicalEmergency => "medical-emergency",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed occurrence agents react to. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    kind: EventKind,
    location: Location,
    severity: f64,
    #[serde(default)]
    attributes: Attributes,
}

impl Event {
    /// Severity is clamped into `0.0..=1.0`.
    pub fn new(
        id: impl Into<String>,
        kind: EventKind,
        location: Location,
        severity: f64,
        attributes: Attributes,
    ) -> Self {
        let severity = if severity.is_nan() {
            0.0
        } else {
            severity.clamp(0.0, 1.0)
        };
        Self {
            id: id.into(),
            kind,
            location,
            severity,
            attributes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn severity(&self) -> f64 {
        self.severity
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.attribute(key).and_then(AttributeValue::as_number)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.attribute(key).and_then(AttributeValue::as_flag)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] at {} severity={:.2}",
            self.kind, self.id, self.location, self.severity
        )
    }
}
