use super::AppState;
use crate::error::IngestError;
use crate::models::sensor_data::NewSensorData;
use agrimon_core::error::MeasurementError;
use agrimon_core::{finite, parse_measurement};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};
use utoipa::ToSchema;

const DEFAULT_AUDIO_EXT: &str = "mp3";
const AUDIO_PREFIX: &str = "uploads/sensor_audio_";

/// Gateway payload, each value may be a number, a numeric string or null.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct JsonReadingDto {
    #[schema(value_type = Option<f64>)]
    pub temperature: Option<Value>,
    #[schema(value_type = Option<f64>)]
    pub humidity: Option<Value>,
    #[schema(value_type = Option<f64>)]
    pub soil_moisture: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JsonIngestedDto {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JsonIngestResponseDto {
    pub success: bool,
    pub message: String,
    pub data: JsonIngestedDto,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FormIngestedDto {
    pub id: i64,
    pub audio_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FormIngestResponseDto {
    pub success: bool,
    pub message: String,
    pub data: FormIngestedDto,
}

/// Decoded multipart submission of the webhook.
#[derive(Debug, Default)]
pub struct FormSubmission {
    pub fields: HashMap<String, String>,
    pub audio: Option<AudioUpload>,
}

impl FormSubmission {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Debug)]
pub struct AudioUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl AppState {
    /// Stores the three climate values of a gateway reading.
    #[tracing::instrument(skip(self, body), fields(len = body.len()))]
    pub async fn ingest_json(&self, body: &[u8]) -> Result<JsonIngestResponseDto, IngestError> {
        let dto: JsonReadingDto = serde_json::from_slice(body)?;
        let reading = NewSensorData {
            temperature: Some(json_measurement("temperature", dto.temperature.as_ref())?),
            humidity: Some(json_measurement("humidity", dto.humidity.as_ref())?),
            soil_moisture: Some(json_measurement(
                "soil_moisture",
                dto.soil_moisture.as_ref(),
            )?),
            ..Default::default()
        };

        let id = self.sensors.insert_reading(&reading).await?;
        info!(id, "Stored gateway reading");
        Ok(JsonIngestResponseDto {
            success: true,
            message: "Gateway data received and saved successfully".to_owned(),
            data: JsonIngestedDto { id },
        })
    }

    /// Stores a full webhook reading, uploading the optional audio clip
    /// before the row is written.
    #[tracing::instrument(skip(self, form))]
    pub async fn ingest_form(
        &self,
        form: FormSubmission,
    ) -> Result<FormIngestResponseDto, IngestError> {
        let mut reading = NewSensorData {
            temperature: Some(parse_measurement("temperature", form.text("temperature"))?),
            humidity: Some(parse_measurement("humidity", form.text("humidity"))?),
            soil_moisture: Some(parse_measurement(
                "soil_moisture",
                form.text("soil_moisture"),
            )?),
            nitrogen_value: Some(parse_measurement("nitrogen", form.text("nitrogen"))?),
            phosphorus_value: Some(parse_measurement("phosphorus", form.text("phosphorus"))?),
            potassium_value: Some(parse_measurement("potassium", form.text("potassium"))?),
            auto_message: Some(form.text("auto_message").unwrap_or_default().to_owned()),
            audio_url: None,
        };

        if let Some(audio) = form.audio.as_ref().filter(|a| !a.bytes.is_empty()) {
            let ext = audio_extension(audio.filename.as_deref(), audio.content_type.as_deref());
            let path = audio_object_path(ext, Utc::now().timestamp_millis());
            self.objects
                .put(&self.audio_bucket, &path, &audio.bytes)
                .await?;
            let url = self.objects.public_url(&self.audio_bucket, &path);
            info!(url = %url, size = audio.bytes.len(), "Stored audio clip");
            reading.audio_url = Some(url);
        }

        let id = match self.sensors.insert_reading(&reading).await {
            Ok(id) => id,
            Err(err) => {
                if let Some(url) = &reading.audio_url {
                    warn!(url = %url, "Audio clip left without a reading");
                }
                return Err(err.into());
            }
        };
        info!(id, "Stored webhook reading");
        Ok(FormIngestResponseDto {
            success: true,
            message: "Sensor data received and saved successfully".to_owned(),
            data: FormIngestedDto {
                id,
                audio_url: reading.audio_url,
            },
        })
    }
}

fn json_measurement(field: &'static str, value: Option<&Value>) -> Result<f64, MeasurementError> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(number)) => match number.as_f64() {
            Some(value) => finite(field, value),
            None => Err(MeasurementError::NotANumber(field, number.to_string())),
        },
        Some(Value::String(raw)) => parse_measurement(field, Some(raw.as_str())),
        Some(other) => Err(MeasurementError::NotANumber(field, other.to_string())),
    }
}

/// The storage route derives the served content type from the extension,
/// so a declared type is kept in the object name.
fn audio_extension<'a>(filename: Option<&'a str>, content_type: Option<&str>) -> &'a str {
    filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .or_else(|| content_type.and_then(extension_for))
        .unwrap_or(DEFAULT_AUDIO_EXT)
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/wave" | "audio/x-wav" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "audio/webm" => Some("webm"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/flac" => Some("flac"),
        _ => None,
    }
}

fn audio_object_path(ext: &str, millis: i64) -> String {
    use rand::distributions::{Alphanumeric, DistString};
    let suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), 6);
    format!("{}{}_{}.{}", AUDIO_PREFIX, millis, suffix, ext)
}
