use super::IdRecord;
use crate::error::DBError;
use agrimon_core::SensorReadingMessage;
use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct SensorDataDao {
    pub(crate) id: i64,
    pub(crate) temperature: Option<f64>,
    pub(crate) humidity: Option<f64>,
    pub(crate) soil_moisture: Option<f64>,
    pub(crate) nitrogen_value: Option<f64>,
    pub(crate) phosphorus_value: Option<f64>,
    pub(crate) potassium_value: Option<f64>,
    pub(crate) auto_message: Option<String>,
    pub(crate) audio_url: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<SensorDataDao> for SensorReadingMessage {
    fn from(val: SensorDataDao) -> Self {
        SensorReadingMessage {
            created_at: val.created_at,
            temperature: val.temperature,
            humidity: val.humidity,
            soil_moisture: val.soil_moisture,
            nitrogen_value: val.nitrogen_value,
            phosphorus_value: val.phosphorus_value,
            potassium_value: val.potassium_value,
            auto_message: val.auto_message,
            audio_url: val.audio_url,
        }
    }
}

/// Values of a row about to be inserted, `None` is stored as NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSensorData {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub nitrogen_value: Option<f64>,
    pub phosphorus_value: Option<f64>,
    pub potassium_value: Option<f64>,
    pub auto_message: Option<String>,
    pub audio_url: Option<String>,
}

pub async fn insert(conn: &sqlx::PgPool, data: &NewSensorData) -> Result<i64, DBError> {
    let record = sql_stmnt!(
        IdRecord,
        r#"INSERT INTO sensor_data
            (temperature, humidity, soil_moisture, nitrogen_value, phosphorus_value,
             potassium_value, auto_message, audio_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id"#,
        data.temperature,
        data.humidity,
        data.soil_moisture,
        data.nitrogen_value,
        data.phosphorus_value,
        data.potassium_value,
        data.auto_message.as_deref(),
        data.audio_url.as_deref()
    )
    .fetch_one(conn)
    .await?;
    Ok(record.id)
}

pub async fn get_latest(conn: &sqlx::PgPool, count: i64) -> Result<Vec<SensorDataDao>, DBError> {
    Ok(sql_stmnt!(
        SensorDataDao,
        r#"SELECT * FROM sensor_data
            ORDER BY created_at DESC, id DESC
            LIMIT $1"#,
        count
    )
    .fetch_all(conn)
    .await?)
}

pub async fn get_npk_history(
    conn: &sqlx::PgPool,
    limit: i64,
) -> Result<Vec<SensorDataDao>, DBError> {
    Ok(sql_stmnt!(
        SensorDataDao,
        r#"SELECT * FROM sensor_data
            WHERE nitrogen_value IS NOT NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $1"#,
        limit
    )
    .fetch_all(conn)
    .await?)
}
