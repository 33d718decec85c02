use super::AppState;
use crate::error::{ApiError, AuthError, HandlerError};
use crate::models::user::{AdminAction, AdminOutcome, UserWithRolesDao};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminRequestDto {
    /// One of `delete_user`, `add_role`, `remove_role`
    pub action: String,
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminResponseDto {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub roles: Vec<String>,
}

impl From<UserWithRolesDao> for UserDto {
    fn from(val: UserWithRolesDao) -> Self {
        UserDto {
            id: val.id,
            username: val.username,
            email: val.email,
            created_at: val.created_at,
            roles: val.roles,
        }
    }
}

impl AdminRequestDto {
    pub fn parse(&self) -> Result<AdminAction, ApiError> {
        let user_id = Uuid::parse_str(self.user_id.trim())
            .map_err(|_| ApiError::Validation(format!("Invalid userId: {}", self.user_id)))?;
        let role = || match self.role.as_deref().map(str::trim) {
            Some(role) if !role.is_empty() => Ok(role.to_owned()),
            _ => Err(ApiError::Validation(format!(
                "role is required for {}",
                self.action
            ))),
        };

        match self.action.as_str() {
            "delete_user" => Ok(AdminAction::DeleteUser(user_id)),
            "add_role" => Ok(AdminAction::AddRole(user_id, role()?)),
            "remove_role" => Ok(AdminAction::RemoveRole(user_id, role()?)),
            _ => Err(ApiError::Validation("Invalid action".to_owned())),
        }
    }
}

impl AppState {
    /// Deletes a user or changes its roles, on behalf of an admin.
    ///
    /// `body` is decoded only after the caller proved to be an admin.
    #[tracing::instrument(skip(self, authorization, body))]
    pub async fn manage_user(
        &self,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<AdminResponseDto, HandlerError> {
        let caller = self.authenticate(authorization).await?;
        self.require_role(caller, &self.admin_role).await?;
        let dto: AdminRequestDto = super::decode_body(body)?;
        let action = dto.parse()?;

        let rows = match self
            .users
            .apply_admin_action(caller, &self.admin_role, &action)
            .await?
        {
            AdminOutcome::Applied { rows } => rows,
            // grant vanished after the first check
            AdminOutcome::Forbidden => {
                return Err(AuthError::Forbidden(self.admin_role.clone()).into())
            }
        };
        info!(caller = %caller, ?action, rows, "Applied admin action");

        let message = match action {
            AdminAction::DeleteUser(_) => "User deleted successfully",
            AdminAction::AddRole(..) if rows == 0 => "Role already assigned",
            AdminAction::AddRole(..) => "Role added successfully",
            AdminAction::RemoveRole(..) => "Role removed successfully",
        };
        Ok(AdminResponseDto {
            success: true,
            message: message.to_owned(),
        })
    }

    /// All profiles with their roles, newest first.
    #[tracing::instrument(skip(self, authorization))]
    pub async fn list_users(
        &self,
        authorization: Option<&str>,
    ) -> Result<Vec<UserDto>, HandlerError> {
        let caller = self.authenticate(authorization).await?;
        self.require_role(caller, &self.admin_role).await?;
        let mut users = self.users.list_users().await?;
        Ok(users.drain(..).map(UserDto::from).collect())
    }
}
