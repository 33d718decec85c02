use super::{bearer, build_response, raw_body, ErrorResponseDto};
use crate::handlers::admin::{AdminRequestDto, AdminResponseDto, UserDto};
use crate::handlers::AppState;
use std::sync::Arc;
use utoipa::OpenApi;
use warp::hyper::body::Bytes;
use warp::Filter;

#[derive(OpenApi)]
#[openapi(
    paths(manage_user, list_users),
    components(schemas(AdminRequestDto, AdminResponseDto, UserDto, ErrorResponseDto)),
    tags((name = "admin", description = "User and role management"))
)]
pub struct ApiDoc;

pub fn routes(
    state: &Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    manage_user(state.clone()).or(list_users(state.clone()))
}

/// POST /api/admin/users
///
/// Delete a user, or add or remove one of its roles
///
/// The caller needs the admin role, checked again atomically with the change
#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = AdminRequestDto,
    responses(
        (status = 200, description = "Action applied", body = AdminResponseDto),
        (status = 400, description = "Malformed body or invalid action", body = ErrorResponseDto),
        (status = 401, description = "Missing or invalid token", body = ErrorResponseDto),
        (status = 403, description = "Caller is no admin", body = ErrorResponseDto),
        (status = 404, description = "Target user not found", body = ErrorResponseDto)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
fn manage_user(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "admin" / "users"))
        .and(warp::post())
        .and(bearer())
        .and(raw_body())
        .and_then(|state: Arc<AppState>, auth: Option<String>, body: Bytes| async move {
            let resp = state.manage_user(auth.as_deref(), &body).await;
            build_response(resp)
        })
        .boxed()
}

/// GET /api/admin/users
///
/// List all users with their roles, newest first
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users", body = [UserDto]),
        (status = 401, description = "Missing or invalid token", body = ErrorResponseDto),
        (status = 403, description = "Caller is no admin", body = ErrorResponseDto)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
fn list_users(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "admin" / "users"))
        .and(warp::get())
        .and(bearer())
        .and_then(|state: Arc<AppState>, auth: Option<String>| async move {
            let resp = state.list_users(auth.as_deref()).await;
            build_response(resp)
        })
        .boxed()
}
