use super::{bearer, build_response, json_body, raw_body, ErrorResponseDto};
use crate::error::HandlerError;
use crate::handlers::relay::{
    RelayDetailsDto, RelayRequestDto, RelayResponseDto, SavedRelayRequestDto,
};
use crate::handlers::AppState;
use crate::relay::{Attempt, Transport};
use std::sync::Arc;
use utoipa::OpenApi;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Reply};

#[derive(OpenApi)]
#[openapi(
    paths(relay, relay_saved),
    components(schemas(
        RelayRequestDto,
        SavedRelayRequestDto,
        RelayResponseDto,
        RelayDetailsDto,
        Attempt,
        Transport,
        ErrorResponseDto
    )),
    tags((name = "relay", description = "Outbound messages to field devices"))
)]
pub struct ApiDoc;

pub fn routes(
    state: &Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    relay(state.clone()).or(relay_saved(state.clone()))
}

/// POST /api/relay
///
/// Publish one message to a broker, with a single HTTP fallback
///
/// Returns 502 with every attempted endpoint if nothing accepted it
#[utoipa::path(
    post,
    path = "/api/relay",
    request_body = RelayRequestDto,
    responses(
        (status = 200, description = "Message delivered", body = RelayResponseDto),
        (status = 400, description = "Invalid request or unpublishable message", body = ErrorResponseDto),
        (status = 502, description = "No endpoint accepted the message", body = RelayResponseDto)
    ),
    tag = "relay"
)]
fn relay(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "relay"))
        .and(warp::post())
        .and(json_body())
        .and_then(|state: Arc<AppState>, body: RelayRequestDto| async move {
            let resp = state.relay_message(body).await;
            build_relay_response(resp)
        })
        .boxed()
}

/// POST /api/relay/saved
///
/// Publish with the caller's stored broker settings
///
/// The body is optional, a `message` in it overrides the stored one
#[utoipa::path(
    post,
    path = "/api/relay/saved",
    request_body = SavedRelayRequestDto,
    responses(
        (status = 200, description = "Message delivered", body = RelayResponseDto),
        (status = 400, description = "Malformed body", body = ErrorResponseDto),
        (status = 401, description = "Missing or invalid token", body = ErrorResponseDto),
        (status = 404, description = "No settings stored", body = ErrorResponseDto),
        (status = 502, description = "No endpoint accepted the message", body = RelayResponseDto)
    ),
    security(("bearer_auth" = [])),
    tag = "relay"
)]
fn relay_saved(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "relay" / "saved"))
        .and(warp::post())
        .and(bearer())
        .and(raw_body())
        .and_then(
            |state: Arc<AppState>, auth: Option<String>, body: Bytes| async move {
                let resp = match state.authenticate(auth.as_deref()).await {
                    Ok(user_id) => match SavedRelayRequestDto::from_body(&body) {
                        Ok(dto) => state.relay_saved(user_id, dto).await,
                        Err(err) => Err(err.into()),
                    },
                    Err(err) => Err(err.into()),
                };
                build_relay_response(resp)
            },
        )
        .boxed()
}

fn build_relay_response(
    resp: Result<RelayResponseDto, HandlerError>,
) -> Result<warp::reply::Response, warp::Rejection> {
    match resp {
        Ok(dto) if !dto.success => Ok(warp::reply::with_status(
            warp::reply::json(&dto),
            StatusCode::BAD_GATEWAY,
        )
        .into_response()),
        resp => build_response(resp),
    }
}
