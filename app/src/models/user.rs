use super::{CountRecord, IdRecord};
use crate::error::DBError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum AdminAction {
    DeleteUser(Uuid),
    AddRole(Uuid, String),
    RemoveRole(Uuid, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOutcome {
    /// The action ran, touching `rows` rows.
    Applied { rows: u64 },
    /// The caller did not hold the admin role at mutation time.
    Forbidden,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct ProfileDao {
    pub(crate) id: Uuid,
    pub(crate) username: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRoleRecord {
    user_id: Uuid,
    role: String,
}

#[derive(sqlx::FromRow)]
struct SessionRecord {
    user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserWithRolesDao {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub roles: Vec<String>,
}

pub async fn resolve_token(conn: &sqlx::PgPool, token: &str) -> Result<Option<Uuid>, DBError> {
    let session = sql_stmnt!(
        SessionRecord,
        r#"SELECT user_id FROM sessions
            WHERE token = $1 AND (expires_at IS NULL OR expires_at > now())"#,
        token
    )
    .fetch_optional(conn)
    .await?;
    Ok(session.map(|s| s.user_id))
}

pub async fn has_role(conn: &sqlx::PgPool, user_id: Uuid, role: &str) -> Result<bool, DBError> {
    let rows = sql_stmnt!(
        CountRecord,
        "SELECT count(*) as count FROM user_roles WHERE user_id = $1 AND role = $2",
        user_id,
        role
    )
    .fetch_one(conn)
    .await?;
    Ok(rows.count() > 0)
}

/// Runs `action` in a transaction that first share-locks the caller's
/// admin grant, so the grant cannot vanish between check and mutation.
pub async fn apply_admin_action(
    conn: &sqlx::PgPool,
    caller: Uuid,
    admin_role: &str,
    action: &AdminAction,
) -> Result<AdminOutcome, DBError> {
    let mut tx = conn.begin().await?;

    let grant = sql_stmnt!(
        IdRecord,
        r#"SELECT id FROM user_roles
            WHERE user_id = $1 AND role = $2
            LIMIT 1 FOR SHARE"#,
        caller,
        admin_role
    )
    .fetch_optional(&mut *tx)
    .await?;
    if grant.is_none() {
        tx.rollback().await?;
        return Ok(AdminOutcome::Forbidden);
    }

    let rows = match action {
        AdminAction::DeleteUser(user_id) => {
            let result = sql_stmnt!("DELETE FROM profiles WHERE id = $1", *user_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(DBError::UserNotFound(*user_id));
            }
            result.rows_affected()
        }
        AdminAction::AddRole(user_id, role) => {
            // serializes concurrent grants to the same profile, the
            // NOT EXISTS check alone races under READ COMMITTED
            let target =
                sql_stmnt!("SELECT id FROM profiles WHERE id = $1 FOR UPDATE", *user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if target.is_none() {
                return Err(DBError::UserNotFound(*user_id));
            }

            sql_stmnt!(
                r#"INSERT INTO user_roles (user_id, role)
                    SELECT $1, $2
                    WHERE NOT EXISTS (
                        SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2
                    )"#,
                *user_id,
                role.as_str()
            )
            .execute(&mut *tx)
            .await?
            .rows_affected()
        }
        AdminAction::RemoveRole(user_id, role) => sql_stmnt!(
            "DELETE FROM user_roles WHERE user_id = $1 AND role = $2",
            *user_id,
            role.as_str()
        )
        .execute(&mut *tx)
        .await?
        .rows_affected(),
    };

    tx.commit().await?;
    Ok(AdminOutcome::Applied { rows })
}

/// READ profiles with their roles, newest first
pub async fn list(conn: &sqlx::PgPool) -> Result<Vec<UserWithRolesDao>, DBError> {
    let mut profiles = sql_stmnt!(
        ProfileDao,
        "SELECT id, username, email, created_at FROM profiles ORDER BY created_at DESC"
    )
    .fetch_all(conn)
    .await?;
    let mut grants = sql_stmnt!(
        UserRoleRecord,
        "SELECT user_id, role FROM user_roles ORDER BY created_at ASC"
    )
    .fetch_all(conn)
    .await?;

    let mut roles: HashMap<Uuid, Vec<String>> = HashMap::new();
    for grant in grants.drain(..) {
        roles.entry(grant.user_id).or_default().push(grant.role);
    }

    Ok(profiles
        .drain(..)
        .map(|p| UserWithRolesDao {
            roles: roles.remove(&p.id).unwrap_or_default(),
            id: p.id,
            username: p.username,
            email: p.email,
            created_at: p.created_at,
        })
        .collect())
}
