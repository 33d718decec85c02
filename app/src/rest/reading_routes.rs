use super::query::HistoryQuery;
use super::{bearer, build_response, ErrorResponseDto};
use crate::handlers::AppState;
use agrimon_core::SensorReadingMessage;
use std::sync::Arc;
use utoipa::OpenApi;
use warp::Filter;

#[derive(OpenApi)]
#[openapi(
    paths(latest_reading, reading_history),
    components(schemas(SensorReadingMessage, ErrorResponseDto)),
    tags((name = "readings", description = "Sensor data for the dashboard"))
)]
pub struct ApiDoc;

pub fn routes(
    state: &Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    latest_reading(state.clone()).or(reading_history(state.clone()))
}

/// GET /api/readings/latest
///
/// Newest value of every field over the two most recent readings
#[utoipa::path(
    get,
    path = "/api/readings/latest",
    responses(
        (status = 200, description = "Merged reading", body = SensorReadingMessage),
        (status = 401, description = "Missing or invalid token", body = ErrorResponseDto),
        (status = 404, description = "No readings yet", body = ErrorResponseDto)
    ),
    security(("bearer_auth" = [])),
    tag = "readings"
)]
fn latest_reading(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "readings" / "latest"))
        .and(warp::get())
        .and(bearer())
        .and_then(|state: Arc<AppState>, auth: Option<String>| async move {
            let resp = match state.authenticate(auth.as_deref()).await {
                Ok(_) => state.latest_reading().await,
                Err(err) => Err(err.into()),
            };
            build_response(resp)
        })
        .boxed()
}

/// GET /api/readings/history?limit=N
///
/// Readings carrying nutrient values, newest first
#[utoipa::path(
    get,
    path = "/api/readings/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Nutrient history", body = [SensorReadingMessage]),
        (status = 401, description = "Missing or invalid token", body = ErrorResponseDto)
    ),
    security(("bearer_auth" = [])),
    tag = "readings"
)]
fn reading_history(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "readings" / "history"))
        .and(warp::get())
        .and(bearer())
        .and(warp::query::<HistoryQuery>())
        .and_then(
            |state: Arc<AppState>, auth: Option<String>, query: HistoryQuery| async move {
                let resp = match state.authenticate(auth.as_deref()).await {
                    Ok(_) => state.reading_history(query.limit()).await,
                    Err(err) => Err(err.into()),
                };
                build_response(resp)
            },
        )
        .boxed()
}
