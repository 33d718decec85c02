use super::AppState;
use crate::error::{ApiError, HandlerError};
use agrimon_core::{merge_latest, SensorReadingMessage};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 500;

impl AppState {
    /// Newest value per field over the two most recent rows.
    pub async fn latest_reading(&self) -> Result<SensorReadingMessage, HandlerError> {
        let mut rows = self.sensors.latest_readings(2).await?;
        let messages: Vec<SensorReadingMessage> = rows.drain(..).map(Into::into).collect();
        merge_latest(&messages)
            .ok_or_else(|| ApiError::NotFound("No sensor data recorded".to_owned()).into())
    }

    /// Rows with nutrient values, newest first.
    pub async fn reading_history(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<SensorReadingMessage>, HandlerError> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let mut rows = self.sensors.npk_history(limit).await?;
        Ok(rows.drain(..).map(Into::into).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handlers::mock::mocked_state;
    use crate::models::sensor_data::NewSensorData;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_latest_reading_merges_two_rows() {
        // prepare
        let mock = mocked_state();
        let now = Utc::now();
        mock.store.push_reading(
            NewSensorData {
                nitrogen_value: Some(5.0),
                temperature: Some(1.0),
                ..Default::default()
            },
            now - Duration::minutes(10),
        );
        mock.store.push_reading(
            NewSensorData {
                nitrogen_value: Some(12.0),
                auto_message: Some("irrigate".to_owned()),
                ..Default::default()
            },
            now - Duration::minutes(5),
        );
        mock.store.push_reading(
            NewSensorData {
                temperature: Some(27.0),
                humidity: Some(55.0),
                ..Default::default()
            },
            now,
        );

        // execute
        let latest = mock.state.latest_reading().await.unwrap();

        // validate
        assert_eq!(now, latest.created_at);
        assert_eq!(Some(27.0), latest.temperature);
        assert_eq!(Some(12.0), latest.nitrogen_value);
        assert_eq!(Some("irrigate".to_owned()), latest.auto_message);
        assert_eq!(None, latest.soil_moisture);
    }

    #[tokio::test]
    async fn test_latest_reading_empty() {
        let mock = mocked_state();
        assert!(matches!(
            mock.state.latest_reading().await,
            Err(HandlerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_filters_and_clamps() {
        // prepare
        let mock = mocked_state();
        let now = Utc::now();
        for i in 0..5 {
            mock.store.push_reading(
                NewSensorData {
                    nitrogen_value: (i % 2 == 0).then_some(i as f64),
                    ..Default::default()
                },
                now + Duration::seconds(i),
            );
        }

        // execute
        let all = mock.state.reading_history(None).await.unwrap();
        let one = mock.state.reading_history(Some(0)).await.unwrap();

        // validate
        let nitrogen: Vec<Option<f64>> = all.iter().map(|r| r.nitrogen_value).collect();
        assert_eq!(vec![Some(4.0), Some(2.0), Some(0.0)], nitrogen);
        assert_eq!(1, one.len());
    }
}
