use crate::error::{ApiError, AuthError};
use crate::models::{SensorStore, SettingsStore, UserStore};
use crate::relay::Relay;
use crate::storage::ObjectStore;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub mod admin;
pub mod ingest;
pub mod readings;
pub mod relay;
pub mod settings;

#[cfg(test)]
pub(crate) mod mock;

/// Request scoped business logic over the injected backends.
pub struct AppState {
    sensors: Arc<dyn SensorStore>,
    settings: Arc<dyn SettingsStore>,
    users: Arc<dyn UserStore>,
    objects: Arc<dyn ObjectStore>,
    relay: Relay,
    audio_bucket: String,
    admin_role: String,
}

impl AppState {
    pub fn new<S>(
        store: Arc<S>,
        objects: Arc<dyn ObjectStore>,
        relay: Relay,
        audio_bucket: &str,
        admin_role: &str,
    ) -> Arc<Self>
    where
        S: SensorStore + SettingsStore + UserStore + 'static,
    {
        Arc::new(AppState {
            sensors: store.clone(),
            settings: store.clone(),
            users: store,
            objects,
            relay,
            audio_bucket: audio_bucket.to_owned(),
            admin_role: admin_role.to_owned(),
        })
    }

    pub fn admin_role(&self) -> &str {
        &self.admin_role
    }

    /// Resolves the `Authorization` header to a user id.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Uuid, AuthError> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(AuthError::MissingCredential)?;
        let user_id = self
            .users
            .resolve_token(token)
            .await?
            .ok_or(AuthError::InvalidCredential)?;
        debug!(user = %user_id, "Authenticated request");
        Ok(user_id)
    }

    async fn require_role(&self, user_id: Uuid, role: &str) -> Result<(), AuthError> {
        if self.users.has_role(user_id, role).await? {
            Ok(())
        } else {
            Err(AuthError::Forbidden(role.to_owned()))
        }
    }

    pub async fn check_db(&self) -> String {
        match self.sensors.check_schema().await {
            Ok(_) => "OK".to_owned(),
            Err(err) => format!("ERROR: {}", err),
        }
    }
}

/// Decodes a JSON request body once the caller is known.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod test {
    use super::mock::mocked_state;
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(Some("abc"), bearer_token("Bearer abc"));
        assert_eq!(Some("abc"), bearer_token("bearer   abc "));
        assert_eq!(None, bearer_token("Basic abc"));
        assert_eq!(None, bearer_token("Bearer "));
        assert_eq!(None, bearer_token("abc"));
    }

    #[tokio::test]
    async fn test_authenticate() {
        // prepare
        let mock = mocked_state();
        let user_id = mock.store.add_user("token-1", &[]);

        // execute / validate
        assert_eq!(
            user_id,
            mock.state.authenticate(Some("Bearer token-1")).await.unwrap()
        );
        assert!(matches!(
            mock.state.authenticate(None).await,
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            mock.state.authenticate(Some("Bearer nope")).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn test_decode_body() {
        let decoded: serde_json::Value = decode_body(br#"{"a": 1}"#).unwrap();
        assert_eq!(serde_json::json!({"a": 1}), decoded);
        assert!(matches!(
            decode_body::<serde_json::Value>(b"{oops"),
            Err(ApiError::Validation(_))
        ));
        assert!(decode_body::<serde_json::Value>(b"").is_err());
    }

    #[tokio::test]
    async fn test_check_db() {
        let mock = mocked_state();
        assert_eq!("OK", mock.state.check_db().await);
    }
}
