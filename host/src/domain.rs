use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;

use crate::decision::Decision;
use crate::error::{IngestError, IngestResult};

/// wall-clock format shared by the device reply and the dashboard
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// status shown before the first reading arrives
pub const WAITING_STATUS: &str = "waiting for first reading";

/// one reading posted by the sensor node
/// lives only for the duration of a request, then gets folded into LatestState
#[derive(Clone, Debug, PartialEq)]
pub struct SensorReading {
    /// raw MQ gas sensor value (higher = more gas)
    pub gas_level: f64,
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    pub received_at: DateTime<Local>,
}

impl SensorReading {
    /// decode a request body into a reading
    ///
    /// the gas level is read from `mq`, or from `gas_level` when `mq` is absent.
    /// missing fields default to 0. numbers, booleans and numeric strings are
    /// accepted; anything else is a validation error.
    pub fn from_json(body: &[u8], received_at: DateTime<Local>) -> IngestResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(IngestError::EmptyBody);
        }

        let value: Value =
            serde_json::from_slice(body).map_err(|e| IngestError::Malformed(e.to_string()))?;

        let fields = match value {
            Value::Null => return Err(IngestError::EmptyBody),
            Value::Object(map) if map.is_empty() => return Err(IngestError::EmptyBody),
            Value::Object(map) => map,
            _ => return Err(IngestError::Malformed("expected a JSON object".to_string())),
        };

        let gas_level = match fields.get("mq") {
            Some(v) => coerce("mq", Some(v))?,
            None => coerce("gas_level", fields.get("gas_level"))?,
        };

        Ok(Self {
            gas_level,
            temperature: coerce("temperature", fields.get("temperature"))?,
            humidity: coerce("humidity", fields.get("humidity"))?,
            received_at,
        })
    }

    pub fn timestamp(&self) -> String {
        self.received_at.format(TIME_FORMAT).to_string()
    }
}

fn coerce(field: &'static str, value: Option<&Value>) -> IngestResult<f64> {
    let number = match value {
        None => return Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().ok_or(IngestError::NotNumeric { field })?,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| IngestError::NotNumeric { field })?,
        Some(_) => return Err(IngestError::NotNumeric { field }),
    };

    if !number.is_finite() {
        return Err(IngestError::NotFinite { field });
    }
    Ok(number)
}

/// the most recently processed reading plus what the host decided about it
///
/// serialized verbatim for `GET /latest`. every commit replaces the whole value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LatestState {
    pub gas_level: f64,
    pub temperature: f64,
    pub humidity: f64,
    /// human readable classification
    pub status: String,
    /// `YYYY-MM-DD HH:MM:SS`, empty until the first reading
    pub time: String,
    pub spray_active: bool,
    /// 0 = safe, 1 = odor
    pub prediction: u8,
    pub confidence: f64,
}

impl LatestState {
    /// sentinel held from startup until the first reading
    pub fn waiting() -> Self {
        Self {
            gas_level: 0.0,
            temperature: 0.0,
            humidity: 0.0,
            status: WAITING_STATUS.to_string(),
            time: String::new(),
            spray_active: false,
            prediction: 0,
            confidence: 0.0,
        }
    }

    pub fn from_reading(reading: &SensorReading, decision: &Decision) -> Self {
        Self {
            gas_level: reading.gas_level,
            temperature: reading.temperature,
            humidity: reading.humidity,
            status: decision.level.status().to_string(),
            time: reading.timestamp(),
            spray_active: decision.level.spray_active(),
            prediction: decision.prediction.as_u8(),
            confidence: decision.confidence,
        }
    }
}

impl Default for LatestState {
    fn default() -> Self {
        Self::waiting()
    }
}
