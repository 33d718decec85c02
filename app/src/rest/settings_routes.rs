use super::{bearer, build_response, raw_body, ErrorResponseDto};
use crate::handlers::settings::{SettingsDto, SettingsResponseDto};
use crate::handlers::{decode_body, AppState};
use std::sync::Arc;
use utoipa::OpenApi;
use warp::hyper::body::Bytes;
use warp::Filter;

#[derive(OpenApi)]
#[openapi(
    paths(get_settings, put_settings),
    components(schemas(SettingsDto, SettingsResponseDto, ErrorResponseDto)),
    tags((name = "settings", description = "Per user broker settings"))
)]
pub struct ApiDoc;

pub fn routes(
    state: &Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    get_settings(state.clone()).or(put_settings(state.clone()))
}

/// GET /api/settings
///
/// Fetch the caller's broker settings
#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Stored settings", body = SettingsResponseDto),
        (status = 401, description = "Missing or invalid token", body = ErrorResponseDto),
        (status = 404, description = "Nothing stored yet", body = ErrorResponseDto)
    ),
    security(("bearer_auth" = [])),
    tag = "settings"
)]
fn get_settings(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "settings"))
        .and(warp::get())
        .and(bearer())
        .and_then(|state: Arc<AppState>, auth: Option<String>| async move {
            let resp = match state.authenticate(auth.as_deref()).await {
                Ok(user_id) => state.get_settings(user_id).await,
                Err(err) => Err(err.into()),
            };
            build_response(resp)
        })
        .boxed()
}

/// PUT /api/settings
///
/// Save the caller's broker settings, replacing earlier ones
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = SettingsDto,
    responses(
        (status = 200, description = "Saved settings", body = SettingsResponseDto),
        (status = 400, description = "Invalid settings", body = ErrorResponseDto),
        (status = 401, description = "Missing or invalid token", body = ErrorResponseDto)
    ),
    security(("bearer_auth" = [])),
    tag = "settings"
)]
fn put_settings(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "settings"))
        .and(warp::put())
        .and(bearer())
        .and(raw_body())
        .and_then(|state: Arc<AppState>, auth: Option<String>, body: Bytes| async move {
            let resp = match state.authenticate(auth.as_deref()).await {
                Ok(user_id) => match decode_body::<SettingsDto>(&body) {
                    Ok(dto) => state.put_settings(user_id, dto).await,
                    Err(err) => Err(err.into()),
                },
                Err(err) => Err(err.into()),
            };
            build_response(resp)
        })
        .boxed()
}
