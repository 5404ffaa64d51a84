use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::Record;

pub const COL_DEVICES: &str = "devices";
pub const COL_READINGS: &str = "readings";

/// A device is considered online while its newest reading is at most this
/// old.
pub const ONLINE_WINDOW_MINUTES: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Axes {
    /// Euclidean norm.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn abs(&self) -> Axes {
        Axes {
            x: self.x.abs(),
            y: self.y.abs(),
            z: self.z.abs(),
        }
    }

    fn from_value(value: &Value) -> Option<Axes> {
        Some(Axes {
            x: value.get("x")?.as_f64()?,
            y: value.get("y")?.as_f64()?,
            z: value.get("z")?.as_f64()?,
        })
    }
}

/// The store delivers timestamps in three shapes: the store-native object
/// ({seconds, nanos}), an epoch-millis number, or an RFC 3339 string. An
/// unrecognized shape makes the whole reading invalid: it is dropped, not
/// stamped with the current time.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Store { seconds: i64, nanos: u32 },
    EpochMillis(i64),
    Text(String),
}

impl RawTimestamp {
    pub fn from_value(value: &Value) -> Option<RawTimestamp> {
        match value {
            Value::Number(n) => n.as_i64().map(RawTimestamp::EpochMillis),
            Value::String(s) => Some(RawTimestamp::Text(s.clone())),
            Value::Object(map) => {
                let seconds = map.get("seconds")?.as_i64()?;
                let nanos = map.get("nanos").and_then(Value::as_u64).unwrap_or(0) as u32;
                Some(RawTimestamp::Store { seconds, nanos })
            }
            _ => None,
        }
    }

    pub fn normalize(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Store { seconds, nanos } => {
                Utc.timestamp_opt(*seconds, *nanos).single()
            }
            RawTimestamp::EpochMillis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

pub fn normalize_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    RawTimestamp::from_value(value).and_then(|ts| ts.normalize())
}

/// Instantaneous snapshot reported by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub accel: Axes, // m/s²
    pub gyro: Axes,  // rad/s
    pub device_ts: Option<DateTime<Utc>>,
}

/// Windowed average reported by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionAverage {
    pub accel: Axes, // m/s²
    pub gyro: Axes,  // rad/s
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub last: MotionSample,
    pub avg: MotionAverage,
}

impl SensorReading {
    /// Structural validation: a reading missing `ts`, `last.accel`,
    /// `last.gyro`, `avg.accel` or `avg.gyro` is dropped from the pipeline.
    pub fn from_record(record: &Record) -> Option<SensorReading> {
        let ts = normalize_timestamp(record.field("ts")?)?;
        let last = record.field("last")?;
        let avg = record.field("avg")?;
        Some(SensorReading {
            id: record.id.clone(),
            ts,
            last: MotionSample {
                accel: Axes::from_value(last.get("accel")?)?,
                gyro: Axes::from_value(last.get("gyro")?)?,
                device_ts: last.get("ts").and_then(normalize_timestamp),
            },
            avg: MotionAverage {
                accel: Axes::from_value(avg.get("accel")?)?,
                gyro: Axes::from_value(avg.get("gyro")?)?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub last_active: Option<DateTime<Utc>>,
}

impl Device {
    pub fn from_record(record: &Record) -> Option<Device> {
        Some(Device {
            id: record.id.clone(),
            name: record.field("name")?.as_str()?.to_owned(),
            last_active: record.field("last_active").and_then(normalize_timestamp),
        })
    }
}

/// Online/offline is a derived view, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    pub fn derive(latest_reading: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DeviceStatus {
        match latest_reading {
            Some(ts) if now - ts <= Duration::minutes(ONLINE_WINDOW_MINUTES) => {
                DeviceStatus::Online
            }
            _ => DeviceStatus::Offline,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "En línea",
            DeviceStatus::Offline => "Desconectado",
        }
    }
}
