use crate::error::MeasurementError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row of the shared sensor table.
///
/// The periodic gateway fills the climate fields, the webhook fills all
/// of them, so any field may be absent. Absence is `None`, never `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorReadingMessage {
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub nitrogen_value: Option<f64>,
    pub phosphorus_value: Option<f64>,
    pub potassium_value: Option<f64>,
    pub auto_message: Option<String>,
    pub audio_url: Option<String>,
}

impl std::default::Default for SensorReadingMessage {
    fn default() -> Self {
        SensorReadingMessage {
            created_at: Utc::now(),
            temperature: None,
            humidity: None,
            soil_moisture: None,
            nitrogen_value: None,
            phosphorus_value: None,
            potassium_value: None,
            auto_message: None,
            audio_url: None,
        }
    }
}

impl SensorReadingMessage {
    /// Fills every absent field of `self` from `older`.
    ///
    /// `created_at` stays the one of `self`.
    pub fn fill_from(&mut self, older: &SensorReadingMessage) {
        fn fill<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if dst.is_none() {
                dst.clone_from(src);
            }
        }
        fill(&mut self.temperature, &older.temperature);
        fill(&mut self.humidity, &older.humidity);
        fill(&mut self.soil_moisture, &older.soil_moisture);
        fill(&mut self.nitrogen_value, &older.nitrogen_value);
        fill(&mut self.phosphorus_value, &older.phosphorus_value);
        fill(&mut self.potassium_value, &older.potassium_value);
        fill(&mut self.auto_message, &older.auto_message);
        fill(&mut self.audio_url, &older.audio_url);
    }
}

/// Merges rows ordered newest first into one view, taking the newest
/// non-null value per field.
pub fn merge_latest<'a, I>(rows: I) -> Option<SensorReadingMessage>
where
    I: IntoIterator<Item = &'a SensorReadingMessage>,
{
    let mut iter = rows.into_iter();
    let mut merged = iter.next()?.clone();
    for older in iter {
        merged.fill_from(older);
    }
    Some(merged)
}

/// Parses a submitted measurement.
///
/// Missing or blank input counts as `0.0`. Anything else has to be a
/// finite number.
pub fn parse_measurement(field: &'static str, raw: Option<&str>) -> Result<f64, MeasurementError> {
    let trimmed = match raw.map(str::trim) {
        None | Some("") => return Ok(0.0),
        Some(trimmed) => trimmed,
    };
    let value: f64 = trimmed
        .parse()
        .map_err(|_| MeasurementError::NotANumber(field, trimmed.to_owned()))?;
    finite(field, value)
}

pub fn finite(field: &'static str, value: f64) -> Result<f64, MeasurementError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MeasurementError::NotFinite(field))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_measurement_defaults() {
        assert_eq!(Ok(0.0), parse_measurement("temperature", None));
        assert_eq!(Ok(0.0), parse_measurement("temperature", Some("  ")));
        assert_eq!(Ok(21.5), parse_measurement("temperature", Some(" 21.5 ")));
        assert_eq!(Ok(-3.0), parse_measurement("temperature", Some("-3")));
    }

    #[test]
    fn test_parse_measurement_rejects_garbage() {
        let err = parse_measurement("humidity", Some("wet")).unwrap_err();
        assert_eq!(
            MeasurementError::NotANumber("humidity", "wet".to_owned()),
            err
        );
        assert_eq!(
            Err(MeasurementError::NotFinite("humidity")),
            parse_measurement("humidity", Some("NaN"))
        );
        assert_eq!(
            Err(MeasurementError::NotFinite("humidity")),
            parse_measurement("humidity", Some("inf"))
        );
    }

    #[test]
    fn test_merge_latest_prefers_newest_non_null() {
        let now = Utc::now();
        let newest = SensorReadingMessage {
            created_at: now,
            temperature: Some(30.0),
            humidity: Some(60.0),
            soil_moisture: Some(0.0),
            ..Default::default()
        };
        let older = SensorReadingMessage {
            created_at: now - Duration::minutes(1),
            temperature: Some(10.0),
            nitrogen_value: Some(12.0),
            phosphorus_value: Some(7.0),
            potassium_value: Some(3.0),
            auto_message: Some("water now".to_owned()),
            ..Default::default()
        };

        let merged = merge_latest(&[newest, older]).unwrap();

        assert_eq!(now, merged.created_at);
        assert_eq!(Some(30.0), merged.temperature);
        assert_eq!(Some(0.0), merged.soil_moisture);
        assert_eq!(Some(12.0), merged.nitrogen_value);
        assert_eq!(Some("water now"), merged.auto_message.as_deref());
        assert_eq!(None, merged.audio_url);
    }

    #[test]
    fn test_merge_latest_empty() {
        assert!(merge_latest(&Vec::<SensorReadingMessage>::new()).is_none());
    }

    #[test]
    fn test_message_deserialize_missing_fields() {
        let msg: SensorReadingMessage = serde_json::from_str(r#"{"temperature": 1.5}"#).unwrap();
        assert_eq!(Some(1.5), msg.temperature);
        assert_eq!(None, msg.humidity);
    }
}
