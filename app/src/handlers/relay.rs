use super::AppState;
use crate::error::{ApiError, HandlerError};
use crate::relay::{Attempt, RelayReport, RelayRequest, Transport};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RelayRequestDto {
    pub url: String,
    pub port: u16,
    pub topic: Option<String>,
    pub message: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SavedRelayRequestDto {
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RelayDetailsDto {
    pub url: String,
    pub topic: String,
    pub message: String,
    pub delivered_via: Option<Transport>,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RelayResponseDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: RelayDetailsDto,
}

impl SavedRelayRequestDto {
    /// The body is optional, an empty one relays the stored message.
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(SavedRelayRequestDto::default());
        }
        super::decode_body(body)
    }
}

impl RelayResponseDto {
    fn from_report(request: RelayRequest, report: RelayReport) -> Self {
        let (message, error) = match report.delivered_via {
            Some(Transport::Mqtt) => (Some("Message published over MQTT".to_owned()), None),
            Some(Transport::Http) => (
                Some("Message delivered over HTTP fallback".to_owned()),
                None,
            ),
            None => (
                None,
                Some(format!(
                    "Failed to deliver message: {}",
                    report.last_error().unwrap_or("no endpoint reachable")
                )),
            ),
        };
        RelayResponseDto {
            success: report.is_delivered(),
            message,
            error,
            details: RelayDetailsDto {
                url: request.host,
                topic: request.topic,
                message: request.message,
                delivered_via: report.delivered_via,
                attempts: report.attempts,
            },
        }
    }
}

impl AppState {
    /// Forwards one message to the given broker.
    ///
    /// Only validation problems are errors, a failed delivery is a
    /// response with `success == false`.
    #[tracing::instrument(skip(self, dto), fields(url = %dto.url, port = dto.port))]
    pub async fn relay_message(
        &self,
        dto: RelayRequestDto,
    ) -> Result<RelayResponseDto, HandlerError> {
        let host = dto.url.trim();
        if host.is_empty() {
            return Err(ApiError::Validation("url is required".to_owned()).into());
        }
        if dto.message.trim().is_empty() {
            return Err(ApiError::Validation("message is required".to_owned()).into());
        }
        let topic = match dto.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => topic.to_owned(),
            _ => self.relay.default_topic().to_owned(),
        };

        let request = RelayRequest {
            host: host.to_owned(),
            port: dto.port,
            topic,
            message: dto.message,
        };
        let report = self.relay.deliver(&request).await?;
        if report.is_delivered() {
            info!(attempts = report.attempts.len(), "Relayed message");
        } else {
            warn!(attempts = report.attempts.len(), "Relay failed on every endpoint");
        }
        Ok(RelayResponseDto::from_report(request, report))
    }

    /// Relays with the caller's stored broker settings.
    #[tracing::instrument(skip(self, dto))]
    pub async fn relay_saved(
        &self,
        user_id: Uuid,
        dto: SavedRelayRequestDto,
    ) -> Result<RelayResponseDto, HandlerError> {
        let settings = self
            .settings
            .latest_settings(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("No broker settings saved".to_owned()))?;
        let port = u16::try_from(settings.port()).map_err(|_| {
            ApiError::Validation(format!("Stored port {} is out of range", settings.port()))
        })?;

        let message = dto
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| settings.message().to_owned());
        self.relay_message(RelayRequestDto {
            url: settings.url().to_owned(),
            port,
            topic: settings.topic().map(str::to_owned),
            message,
        })
        .await
    }
}
