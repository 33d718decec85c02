use crate::error::DBError;
use async_trait::async_trait;
use uuid::Uuid;

// Runtime checked statements, building must not depend on a live database
macro_rules! sql_stmnt {
    ($ret:ident, $stmt:expr) => {
        sqlx::query_as::<_ ,$ret>($stmt)
    };
    ($stmt:expr) => {
        sqlx::query($stmt)
    };
    ($ret:ident, $stmt:expr, $($bind:expr),*) => {
        sqlx::query_as::<_ ,$ret>($stmt)$(.bind($bind))*
    };
    ($stmt:expr, $($bind:expr),*) => {
        sqlx::query($stmt)$(.bind($bind))*
    };
}

pub mod sensor_data;
pub mod settings;
pub mod user;

#[cfg(test)]
pub mod memory;
#[cfg(test)]
mod test;

use sensor_data::{NewSensorData, SensorDataDao};
use settings::{BrokerSettings, BrokerSettingsDao};
use user::{AdminAction, AdminOutcome, UserWithRolesDao};

pub async fn establish_db_connection(
    database_url: &str,
    max_connections: u32,
) -> Result<sqlx::PgPool, DBError> {
    Ok(sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?)
}

pub async fn run_migrations(conn: &sqlx::PgPool) -> Result<(), DBError> {
    sqlx::migrate!("./migrations").run(conn).await?;
    Ok(())
}

pub async fn check_schema(conn: &sqlx::PgPool) -> Result<(), DBError> {
    sql_stmnt!("SELECT count(*) as count FROM sensor_data")
        .fetch_one(conn)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
pub(crate) struct CountRecord {
    pub count: Option<i64>,
}

impl CountRecord {
    pub fn count(self) -> i64 {
        self.count.unwrap_or(0)
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct IdRecord {
    pub id: i64,
}

/// Rows written by the ingest endpoints and read by the dashboard.
#[async_trait]
pub trait SensorStore: Send + Sync {
    async fn insert_reading(&self, reading: &NewSensorData) -> Result<i64, DBError>;

    /// Most recent rows, newest first.
    async fn latest_readings(&self, count: i64) -> Result<Vec<SensorDataDao>, DBError>;

    /// Rows carrying nutrient values, newest first.
    async fn npk_history(&self, limit: i64) -> Result<Vec<SensorDataDao>, DBError>;

    async fn check_schema(&self) -> Result<(), DBError>;
}

/// One logical broker configuration per user.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn upsert_settings(
        &self,
        user_id: Uuid,
        settings: &BrokerSettings,
    ) -> Result<BrokerSettingsDao, DBError>;

    async fn latest_settings(&self, user_id: Uuid) -> Result<Option<BrokerSettingsDao>, DBError>;

    async fn settings_count(&self, user_id: Uuid) -> Result<i64, DBError>;
}

/// Identities, sessions and role grants.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn resolve_token(&self, token: &str) -> Result<Option<Uuid>, DBError>;

    async fn has_role(&self, user_id: Uuid, role: &str) -> Result<bool, DBError>;

    /// Re-checks that `caller` holds `admin_role` and applies `action` in
    /// the same atomic step.
    async fn apply_admin_action(
        &self,
        caller: Uuid,
        admin_role: &str,
        action: &AdminAction,
    ) -> Result<AdminOutcome, DBError>;

    async fn list_users(&self) -> Result<Vec<UserWithRolesDao>, DBError>;
}

/// All row stores backed by one PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    conn: sqlx::PgPool,
}

impl PgStore {
    pub fn new(conn: sqlx::PgPool) -> Self {
        PgStore { conn }
    }
}

#[async_trait]
impl SensorStore for PgStore {
    async fn insert_reading(&self, reading: &NewSensorData) -> Result<i64, DBError> {
        sensor_data::insert(&self.conn, reading).await
    }

    async fn latest_readings(&self, count: i64) -> Result<Vec<SensorDataDao>, DBError> {
        sensor_data::get_latest(&self.conn, count).await
    }

    async fn npk_history(&self, limit: i64) -> Result<Vec<SensorDataDao>, DBError> {
        sensor_data::get_npk_history(&self.conn, limit).await
    }

    async fn check_schema(&self) -> Result<(), DBError> {
        check_schema(&self.conn).await
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn upsert_settings(
        &self,
        user_id: Uuid,
        settings: &BrokerSettings,
    ) -> Result<BrokerSettingsDao, DBError> {
        settings::upsert(&self.conn, user_id, settings).await
    }

    async fn latest_settings(&self, user_id: Uuid) -> Result<Option<BrokerSettingsDao>, DBError> {
        settings::get_latest(&self.conn, user_id).await
    }

    async fn settings_count(&self, user_id: Uuid) -> Result<i64, DBError> {
        settings::count(&self.conn, user_id).await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn resolve_token(&self, token: &str) -> Result<Option<Uuid>, DBError> {
        user::resolve_token(&self.conn, token).await
    }

    async fn has_role(&self, user_id: Uuid, role: &str) -> Result<bool, DBError> {
        user::has_role(&self.conn, user_id, role).await
    }

    async fn apply_admin_action(
        &self,
        caller: Uuid,
        admin_role: &str,
        action: &AdminAction,
    ) -> Result<AdminOutcome, DBError> {
        user::apply_admin_action(&self.conn, caller, admin_role, action).await
    }

    async fn list_users(&self) -> Result<Vec<UserWithRolesDao>, DBError> {
        user::list(&self.conn).await
    }
}
