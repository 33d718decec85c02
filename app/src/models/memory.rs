use super::sensor_data::{NewSensorData, SensorDataDao};
use super::settings::{BrokerSettings, BrokerSettingsDao};
use super::user::{AdminAction, AdminOutcome, UserWithRolesDao};
use super::{SensorStore, SettingsStore, UserStore};
use crate::error::DBError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// Row stores kept in process memory, one lock over all tables.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    sensor_data: Vec<SensorDataDao>,
    settings: Vec<BrokerSettingsDao>,
    profiles: Vec<(Uuid, DateTime<Utc>)>,
    roles: Vec<(Uuid, String)>,
    sessions: Vec<(String, Uuid)>,
    next_id: i64,
    fail_inserts: bool,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a profile with a session `token` and the given roles.
    pub fn add_user(&self, token: &str, roles: &[&str]) -> Uuid {
        let mut tables = self.inner.lock();
        let user_id = Uuid::new_v4();
        let created_at = Utc::now() + Duration::milliseconds(tables.profiles.len() as i64);
        tables.profiles.push((user_id, created_at));
        tables.sessions.push((token.to_owned(), user_id));
        for role in roles {
            tables.roles.push((user_id, role.to_string()));
        }
        user_id
    }

    pub fn user_exists(&self, user_id: Uuid) -> bool {
        self.inner.lock().profiles.iter().any(|(id, _)| *id == user_id)
    }

    pub fn role_rows(&self, user_id: Uuid, role: &str) -> usize {
        self.inner
            .lock()
            .roles
            .iter()
            .filter(|(id, r)| *id == user_id && r == role)
            .count()
    }

    pub fn readings(&self) -> Vec<SensorDataDao> {
        self.inner.lock().sensor_data.clone()
    }

    /// Inserts a row with an explicit timestamp.
    pub fn push_reading(&self, data: NewSensorData, created_at: DateTime<Utc>) -> i64 {
        let mut tables = self.inner.lock();
        let id = tables.next_id();
        tables.sensor_data.push(dao_from(id, data, created_at));
        id
    }

    pub fn fail_inserts(&self) {
        self.inner.lock().fail_inserts = true;
    }
}

fn dao_from(id: i64, data: NewSensorData, created_at: DateTime<Utc>) -> SensorDataDao {
    SensorDataDao {
        id,
        temperature: data.temperature,
        humidity: data.humidity,
        soil_moisture: data.soil_moisture,
        nitrogen_value: data.nitrogen_value,
        phosphorus_value: data.phosphorus_value,
        potassium_value: data.potassium_value,
        auto_message: data.auto_message,
        audio_url: data.audio_url,
        created_at,
    }
}

fn newest_first(rows: &mut [SensorDataDao]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl SensorStore for MemoryStore {
    async fn insert_reading(&self, reading: &NewSensorData) -> Result<i64, DBError> {
        let mut tables = self.inner.lock();
        if tables.fail_inserts {
            return Err(DBError::SQLError(sqlx::Error::PoolClosed));
        }
        let id = tables.next_id();
        tables
            .sensor_data
            .push(dao_from(id, reading.clone(), Utc::now()));
        Ok(id)
    }

    async fn latest_readings(&self, count: i64) -> Result<Vec<SensorDataDao>, DBError> {
        let mut rows = self.inner.lock().sensor_data.clone();
        newest_first(&mut rows);
        rows.truncate(count.max(0) as usize);
        Ok(rows)
    }

    async fn npk_history(&self, limit: i64) -> Result<Vec<SensorDataDao>, DBError> {
        let mut rows: Vec<SensorDataDao> = self
            .inner
            .lock()
            .sensor_data
            .iter()
            .filter(|r| r.nitrogen_value.is_some())
            .cloned()
            .collect();
        newest_first(&mut rows);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn check_schema(&self) -> Result<(), DBError> {
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn upsert_settings(
        &self,
        user_id: Uuid,
        settings: &BrokerSettings,
    ) -> Result<BrokerSettingsDao, DBError> {
        let mut tables = self.inner.lock();
        let now = Utc::now();
        let existing = tables
            .settings
            .iter_mut()
            .filter(|s| s.user_id == user_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        if let Some(dao) = existing {
            dao.url = settings.url.clone();
            dao.port = settings.port as i32;
            dao.topic = settings.topic.clone();
            dao.message = settings.message.clone();
            dao.updated_at = now;
            return Ok(dao.clone());
        }

        let dao = BrokerSettingsDao {
            id: tables.next_id(),
            user_id,
            url: settings.url.clone(),
            port: settings.port as i32,
            topic: settings.topic.clone(),
            message: settings.message.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.settings.push(dao.clone());
        Ok(dao)
    }

    async fn latest_settings(&self, user_id: Uuid) -> Result<Option<BrokerSettingsDao>, DBError> {
        Ok(self
            .inner
            .lock()
            .settings
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn settings_count(&self, user_id: Uuid) -> Result<i64, DBError> {
        Ok(self
            .inner
            .lock()
            .settings
            .iter()
            .filter(|s| s.user_id == user_id)
            .count() as i64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn resolve_token(&self, token: &str) -> Result<Option<Uuid>, DBError> {
        Ok(self
            .inner
            .lock()
            .sessions
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, user_id)| *user_id))
    }

    async fn has_role(&self, user_id: Uuid, role: &str) -> Result<bool, DBError> {
        Ok(self.role_rows(user_id, role) > 0)
    }

    async fn apply_admin_action(
        &self,
        caller: Uuid,
        admin_role: &str,
        action: &AdminAction,
    ) -> Result<AdminOutcome, DBError> {
        let mut tables = self.inner.lock();
        let is_admin = tables
            .roles
            .iter()
            .any(|(id, role)| *id == caller && role == admin_role);
        if !is_admin {
            return Ok(AdminOutcome::Forbidden);
        }

        let rows = match action {
            AdminAction::DeleteUser(user_id) => {
                let before = tables.profiles.len();
                tables.profiles.retain(|(id, _)| id != user_id);
                if tables.profiles.len() == before {
                    return Err(DBError::UserNotFound(*user_id));
                }
                tables.roles.retain(|(id, _)| id != user_id);
                tables.sessions.retain(|(_, id)| id != user_id);
                tables.settings.retain(|s| s.user_id != *user_id);
                1
            }
            AdminAction::AddRole(user_id, role) => {
                if !tables.profiles.iter().any(|(id, _)| id == user_id) {
                    return Err(DBError::UserNotFound(*user_id));
                }
                if tables.roles.iter().any(|(id, r)| id == user_id && r == role) {
                    0
                } else {
                    tables.roles.push((*user_id, role.clone()));
                    1
                }
            }
            AdminAction::RemoveRole(user_id, role) => {
                let before = tables.roles.len();
                tables.roles.retain(|(id, r)| !(id == user_id && r == role));
                (before - tables.roles.len()) as u64
            }
        };
        Ok(AdminOutcome::Applied { rows })
    }

    async fn list_users(&self) -> Result<Vec<UserWithRolesDao>, DBError> {
        let tables = self.inner.lock();
        let mut users: Vec<UserWithRolesDao> = tables
            .profiles
            .iter()
            .map(|(id, created_at)| UserWithRolesDao {
                id: *id,
                username: None,
                email: None,
                created_at: *created_at,
                roles: tables
                    .roles
                    .iter()
                    .filter(|(user_id, _)| user_id == id)
                    .map(|(_, role)| role.clone())
                    .collect(),
            })
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}
