/// Device ingestion: the producer half of the monitor pipeline.
///
/// Field devices report either a bare CSV line
///
///   temperature,humidity,wind_speed,pressure[,soil_moisture,rainfall,water_level]
///
/// or a JSON envelope
///
///   {"device_id": "kch-01", "location": {"latitude": 1.56, "longitude": 110.34},
///    "temperature": 91.0, "humidity": 84.0, "wind_speed": 12.0, "pressure": 998.0}
///
/// Both are turned into a `SensorMessage` and pushed onto an mpsc channel
/// for `daemon::Monitor` to assess. Nothing here talks to the engine.

use std::io::BufRead;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::InputError;
use crate::model::{Field, Location, Reading};

/// CSV column order. The first four are required.
const CSV_COLUMNS: [Field; 7] = Field::ALL;

// ============================================================================
// Messages
// ============================================================================

/// One reading from one device, tagged for routing through the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorMessage {
    pub device_id: String,
    /// Position in the producer's stream, starting at 0.
    pub sequence: u64,
    pub reading: Reading,
    pub location: Location,
}

/// A parsed JSON envelope. `location` is absent for fixed-site devices
/// whose position comes from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePayload {
    pub device_id: String,
    pub location: Option<Location>,
    pub reading: Reading,
}

// ============================================================================
// Parsing
// ============================================================================

fn malformed(line: &str, reason: impl Into<String>) -> InputError {
    InputError::MalformedLine {
        line: line.to_string(),
        reason: reason.into(),
    }
}

/// Parses a device CSV line. Empty optional columns are treated as absent.
pub fn parse_sensor_line(line: &str) -> Result<Reading, InputError> {
    let parts: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if parts.len() != Field::CORE.len() && parts.len() != CSV_COLUMNS.len() {
        return Err(malformed(
            line,
            format!("expected 4 or 7 values, found {}", parts.len()),
        ));
    }

    let mut reading = Reading::new();
    for (field, raw) in CSV_COLUMNS.iter().zip(&parts) {
        if raw.is_empty() && !Field::CORE.contains(field) {
            continue;
        }
        let value: f64 = raw
            .parse()
            .map_err(|_| malformed(line, format!("{} is not a number: '{}'", field, raw)))?;
        if !value.is_finite() {
            return Err(InputError::NonFinite {
                field: field.to_string(),
                value,
            });
        }
        reading = reading.with(*field, value);
    }
    Ok(reading)
}

/// Parses a JSON device envelope. Measurement keys follow the same strict
/// rules as `Reading::from_json`; `captured_at` (RFC 3339) is optional.
pub fn parse_device_payload(contents: &str) -> Result<DevicePayload, InputError> {
    let doc: Value = serde_json::from_str(contents).map_err(|e| malformed(contents, e.to_string()))?;
    let mut object = doc.as_object().cloned().ok_or(InputError::NotAnObject)?;

    let device_id = match object.remove("device_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(_) => return Err(malformed(contents, "device_id must be a non-empty string")),
        None => return Err(InputError::MissingField("device_id")),
    };

    let location = match object.remove("location") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(parse_location(contents, &raw)?),
    };

    let captured_at = match object.remove("captured_at") {
        None | Some(Value::Null) => None,
        Some(Value::String(ts)) => Some(
            DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| malformed(contents, format!("bad captured_at: {}", e)))?
                .with_timezone(&Utc),
        ),
        Some(_) => return Err(malformed(contents, "captured_at must be an RFC 3339 string")),
    };

    let mut reading = Reading::from_json(&Value::Object(object))?;
    if let Some(at) = captured_at {
        reading = reading.with_captured_at(at);
    }

    Ok(DevicePayload {
        device_id,
        location,
        reading,
    })
}

fn parse_location(contents: &str, raw: &Value) -> Result<Location, InputError> {
    let coord = |key: &str| {
        raw.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed(contents, format!("location.{} must be a number", key)))
    };
    Location::new(coord("latitude")?, coord("longitude")?)
}

// ============================================================================
// Producer
// ============================================================================

/// Spawns a thread that reads `reader` line by line and sends one
/// `SensorMessage` per valid line.
///
/// Lines starting with `{` are JSON envelopes, anything else is CSV. Blank
/// lines and `#` comments are ignored; malformed lines are logged and
/// skipped. CSV lines are attributed to `device_id` at `location`; an
/// envelope's own id and location take precedence.
///
/// The thread stops at end of input or when the receiver hangs up, and
/// returns the number of messages sent.
pub fn spawn_line_producer<R>(
    reader: R,
    device_id: impl Into<String>,
    location: Location,
    tx: Sender<SensorMessage>,
) -> JoinHandle<usize>
where
    R: BufRead + Send + 'static,
{
    let default_device = device_id.into();
    thread::spawn(move || {
        let mut sequence = 0u64;
        let mut skipped = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(device = %default_device, error = %e, "sensor stream read failed; stopping");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let parsed = if trimmed.starts_with('{') {
                parse_device_payload(trimmed).map(|p| SensorMessage {
                    device_id: p.device_id,
                    sequence,
                    reading: p.reading,
                    location: p.location.unwrap_or(location),
                })
            } else {
                parse_sensor_line(trimmed).map(|reading| SensorMessage {
                    device_id: default_device.clone(),
                    sequence,
                    reading,
                    location,
                })
            };

            match parsed {
                Ok(message) => {
                    debug!(device = %message.device_id, sequence, "sensor reading queued");
                    if tx.send(message).is_err() {
                        warn!(device = %default_device, "monitor hung up; stopping producer");
                        break;
                    }
                    sequence += 1;
                }
                Err(e) => {
                    skipped += 1;
                    warn!(device = %default_device, line = line_no + 1, error = %e, "skipping sensor line");
                }
            }
        }

        info!(device = %default_device, sent = sequence, skipped, "sensor stream finished");
        sequence as usize
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::kuching;
    use std::io::Cursor;
    use std::sync::mpsc;

    #[test]
    fn test_parse_core_csv_line() {
        let reading = parse_sensor_line("95.0, 85.0, 10.0, 950.0").unwrap();
        assert_eq!(reading.len(), 4);
        assert_eq!(reading.get(Field::Pressure), Some(950.0));
    }

    #[test]
    fn test_parse_full_csv_line_with_blank_optionals() {
        let reading = parse_sensor_line("88,90,22,990,41.5,,3.2").unwrap();
        assert_eq!(reading.get(Field::SoilMoisture), Some(41.5));
        assert_eq!(reading.get(Field::Rainfall), None, "blank optional column is absent");
        assert_eq!(reading.get(Field::WaterLevel), Some(3.2));
    }

    #[test]
    fn test_csv_rejects_wrong_arity_and_garbage() {
        assert!(matches!(
            parse_sensor_line("1,2,3"),
            Err(InputError::MalformedLine { .. })
        ));
        assert!(matches!(
            parse_sensor_line("95,high,10,950"),
            Err(InputError::MalformedLine { .. })
        ));
        assert!(matches!(
            parse_sensor_line("95,,10,950"),
            Err(InputError::MalformedLine { .. })
        ), "core columns may not be blank");
        assert!(matches!(
            parse_sensor_line("95,NaN,10,950"),
            Err(InputError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_parse_device_payload_with_location() {
        let payload = parse_device_payload(
            r#"{"device_id": "kch-01", "location": {"latitude": 1.56, "longitude": 110.34},
                "captured_at": "2024-05-02T06:30:00Z",
                "temperature": 91.0, "humidity": 84.0, "wind_speed": 12.0, "Pre": 998.0}"#,
        )
        .unwrap();
        assert_eq!(payload.device_id, "kch-01");
        assert_eq!(payload.location, Some(kuching()));
        assert_eq!(payload.reading.get(Field::Pressure), Some(998.0), "legacy 'Pre' label accepted");
        assert_eq!(payload.reading.captured_at.to_rfc3339(), "2024-05-02T06:30:00+00:00");
    }

    #[test]
    fn test_device_payload_errors() {
        assert!(matches!(
            parse_device_payload(r#"{"temperature": 1, "humidity": 1, "wind_speed": 1, "pressure": 1}"#),
            Err(InputError::MissingField("device_id"))
        ));
        assert!(matches!(
            parse_device_payload(r#"{"device_id": "x", "temperature": 1}"#),
            Err(InputError::MissingField(_))
        ));
        assert!(matches!(
            parse_device_payload(
                r#"{"device_id": "x", "location": {"latitude": 95.0, "longitude": 0.0},
                    "temperature": 1, "humidity": 1, "wind_speed": 1, "pressure": 1}"#
            ),
            Err(InputError::InvalidLocation { .. })
        ));
        assert!(matches!(parse_device_payload("[1, 2]"), Err(InputError::NotAnObject)));
    }

    #[test]
    fn test_producer_skips_bad_lines_and_numbers_the_rest() {
        let input = "# header\n\
                     95,85,10,950\n\
                     not,a,reading\n\
                     \n\
                     {\"device_id\": \"sibu-02\", \"temperature\": 80, \"humidity\": 60, \"wind_speed\": 5, \"pressure\": 1015}\n\
                     80,60,5,1015\n";
        let (tx, rx) = mpsc::channel();
        let handle = spawn_line_producer(Cursor::new(input), "kch-01", kuching(), tx);

        let messages: Vec<SensorMessage> = rx.iter().collect();
        assert_eq!(handle.join().unwrap(), 3);
        assert_eq!(messages.len(), 3);

        let sequences: Vec<u64> = messages.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2], "skipped lines do not consume a sequence number");
        assert_eq!(messages[1].device_id, "sibu-02");
        assert_eq!(messages[1].location, kuching(), "envelope without location uses the default");
        assert_eq!(messages[2].device_id, "kch-01");
    }

    #[test]
    fn test_producer_stops_when_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let handle = spawn_line_producer(Cursor::new("95,85,10,950\n80,60,5,1015\n"), "kch-01", kuching(), tx);
        assert_eq!(handle.join().unwrap(), 0);
    }
}
