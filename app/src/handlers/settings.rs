use super::AppState;
use crate::error::{ApiError, HandlerError};
use crate::models::settings::{BrokerSettings, BrokerSettingsDao};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsDto {
    pub url: String,
    pub port: i64,
    pub topic: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponseDto {
    pub url: String,
    pub port: i32,
    pub topic: Option<String>,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl From<BrokerSettingsDao> for SettingsResponseDto {
    fn from(val: BrokerSettingsDao) -> Self {
        SettingsResponseDto {
            url: val.url().to_owned(),
            port: val.port(),
            topic: val.topic().map(str::to_owned),
            message: val.message().to_owned(),
            updated_at: val.updated_at(),
        }
    }
}

impl SettingsDto {
    pub fn validate(&self) -> Result<BrokerSettings, ApiError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ApiError::Validation("url is required".to_owned()));
        }
        let message = self.message.trim();
        if message.is_empty() {
            return Err(ApiError::Validation("message is required".to_owned()));
        }
        let port = u16::try_from(self.port)
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| {
                ApiError::Validation(format!("port must be within 1..65535, got {}", self.port))
            })?;
        let topic = self
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);

        Ok(BrokerSettings {
            url: url.to_owned(),
            port,
            topic,
            message: message.to_owned(),
        })
    }
}

impl AppState {
    pub async fn get_settings(&self, user_id: Uuid) -> Result<SettingsResponseDto, HandlerError> {
        let settings = self
            .settings
            .latest_settings(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("No broker settings saved".to_owned()))?;
        Ok(settings.into())
    }

    #[tracing::instrument(skip(self, dto))]
    pub async fn put_settings(
        &self,
        user_id: Uuid,
        dto: SettingsDto,
    ) -> Result<SettingsResponseDto, HandlerError> {
        let settings = dto.validate()?;
        let stored = self.settings.upsert_settings(user_id, &settings).await?;
        info!(id = stored.id(), "Saved broker settings");
        Ok(stored.into())
    }
}
