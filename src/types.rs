use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Thermostat operating mode, as reported in `SystemSwitchPosition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMode {
    EmergencyHeat,
    Heat,
    Off,
    Cool,
    AutoHeat,
    AutoCool,
    SouthernAway,
    Unknown(i64),
}

impl SystemMode {
    pub fn code(&self) -> i64 {
        match self {
            SystemMode::EmergencyHeat => 0,
            SystemMode::Heat => 1,
            SystemMode::Off => 2,
            SystemMode::Cool => 3,
            SystemMode::AutoHeat => 4,
            SystemMode::AutoCool => 5,
            SystemMode::SouthernAway => 6,
            SystemMode::Unknown(code) => *code,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => SystemMode::EmergencyHeat,
            1 => SystemMode::Heat,
            2 => SystemMode::Off,
            3 => SystemMode::Cool,
            4 => SystemMode::AutoHeat,
            5 => SystemMode::AutoCool,
            6 => SystemMode::SouthernAway,
            other => SystemMode::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Auto,
    On,
    Circulate,
    FollowSchedule,
    Unknown(i64),
}

impl FanMode {
    pub fn code(&self) -> i64 {
        match self {
            FanMode::Auto => 0,
            FanMode::On => 1,
            FanMode::Circulate => 2,
            FanMode::FollowSchedule => 3,
            FanMode::Unknown(code) => *code,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FanMode::Auto,
            1 => FanMode::On,
            2 => FanMode::Circulate,
            3 => FanMode::FollowSchedule,
            other => FanMode::Unknown(other),
        }
    }
}

/// Whether a [`Zone`](crate::Zone) refetches its record before each read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    #[default]
    Always,
    Cached,
}

/// Outdoor conditions scraped from a device control page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutdoorWeather {
    pub temperature: Option<i64>,
    pub humidity: Option<i64>,
}

impl OutdoorWeather {
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("OutdoorTemperature".to_string(), self.temperature.into());
        fields.insert("OutdoorHumidity".to_string(), self.humidity.into());
        fields
    }
}

/// Combined state of one thermostat: the zone-list entry, its name, the
/// `CheckDataSession` payload and the scraped outdoor weather, merged in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneRecord(Map<String, Value>);

impl ZoneRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn device_id(&self) -> Result<u64> {
        self.0
            .get("DeviceID")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::MissingField("DeviceID".to_string()))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("Name").and_then(|v| v.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// JSON pointer lookup, e.g. `/latestData/uiData/HeatSetpoint`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let mut segments = pointer.trim_start_matches('/').split('/');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Shallow overlay: keys from `fields` replace existing top-level keys.
    pub fn merge(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.0.insert(key, value);
        }
    }

    /// Integer at `pointer`. Floats are truncated toward zero.
    pub fn int_at(&self, pointer: &str) -> Result<i64> {
        let value = self
            .pointer(pointer)
            .ok_or_else(|| Error::MissingField(pointer.to_string()))?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| Error::MissingField(pointer.to_string()))
    }

    pub fn bool_at(&self, pointer: &str) -> Result<bool> {
        self.pointer(pointer)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| Error::MissingField(pointer.to_string()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ZoneRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
