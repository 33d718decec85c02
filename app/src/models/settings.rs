use super::CountRecord;
use crate::error::DBError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct BrokerSettingsDao {
    pub(crate) id: i64,
    pub(crate) user_id: Uuid,
    pub(crate) url: String,
    pub(crate) port: i32,
    pub(crate) topic: Option<String>,
    pub(crate) message: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl BrokerSettingsDao {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn port(&self) -> i32 {
        self.port
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Validated broker parameters as submitted by a user.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub url: String,
    pub port: u16,
    pub topic: Option<String>,
    pub message: String,
}

/// Updates the user's most recent row, or inserts the first one.
pub async fn upsert(
    conn: &sqlx::PgPool,
    user_id: Uuid,
    settings: &BrokerSettings,
) -> Result<BrokerSettingsDao, DBError> {
    let updated = sql_stmnt!(
        BrokerSettingsDao,
        r#"UPDATE mqtt_settings
            SET url = $2, port = $3, topic = $4, message = $5, updated_at = now()
            WHERE id = (
                SELECT id FROM mqtt_settings WHERE user_id = $1
                ORDER BY created_at DESC, id DESC LIMIT 1
            )
            RETURNING *"#,
        user_id,
        &settings.url,
        settings.port as i32,
        settings.topic.as_deref(),
        &settings.message
    )
    .fetch_optional(conn)
    .await?;

    if let Some(dao) = updated {
        return Ok(dao);
    }

    Ok(sql_stmnt!(
        BrokerSettingsDao,
        r#"INSERT INTO mqtt_settings (user_id, url, port, topic, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *"#,
        user_id,
        &settings.url,
        settings.port as i32,
        settings.topic.as_deref(),
        &settings.message
    )
    .fetch_one(conn)
    .await?)
}

pub async fn get_latest(
    conn: &sqlx::PgPool,
    user_id: Uuid,
) -> Result<Option<BrokerSettingsDao>, DBError> {
    Ok(sql_stmnt!(
        BrokerSettingsDao,
        r#"SELECT * FROM mqtt_settings
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1"#,
        user_id
    )
    .fetch_optional(conn)
    .await?)
}

pub async fn count(conn: &sqlx::PgPool, user_id: Uuid) -> Result<i64, DBError> {
    let rows = sql_stmnt!(
        CountRecord,
        "SELECT count(*) as count FROM mqtt_settings WHERE user_id = $1",
        user_id
    )
    .fetch_one(conn)
    .await?;
    Ok(rows.count())
}
