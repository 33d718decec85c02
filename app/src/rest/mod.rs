use crate::config::Config;
use crate::error::HandlerError;
use crate::handlers::AppState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use warp::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use warp::http::{HeaderMap, HeaderValue, Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

mod admin_routes;
mod doc_routes;
mod ingest_routes;
mod metric_routes;
mod query;
mod reading_routes;
mod relay_routes;
mod settings_routes;


pub const JSON_BODY_LIMIT: u64 = 16 * 1024;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponseDto {
    pub success: bool,
    pub error: String,
}

/// Every endpoint, with rejections rendered as JSON and CORS headers on
/// every response.
pub fn routes(
    state: &Arc<AppState>,
    storage_dir: PathBuf,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    let api = ingest_routes::routes(state, max_upload_bytes)
        .or(relay_routes::routes(state))
        .or(admin_routes::routes(state))
        .or(settings_routes::routes(state))
        .or(reading_routes::routes(state))
        .or(metric_routes::routes(state))
        .or(doc_routes::swagger(api_docs()))
        .or(warp::path("storage").and(warp::fs::dir(storage_dir)));

    preflight()
        .or(api)
        .recover(handle_rejection)
        .with(warp::reply::with::headers(cors_headers()))
        .with(warp::trace::request())
}

pub async fn dispatch_server(state: Arc<AppState>, config: &Config) -> Result<(), warp::Error> {
    let routes = routes(
        &state,
        PathBuf::from(config.storage_dir()),
        config.max_upload_bytes(),
    );
    let (addr, server) = warp::serve(routes).try_bind_with_graceful_shutdown(
        ([0, 0, 0, 0], config.server_port()),
        async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(err) => {
                    error!("Cannot listen for shutdown signal: {}", err);
                    std::future::pending::<()>().await
                }
            }
        },
    )?;

    info!("Starting webserver at: {}", addr);
    server.await;
    info!("Webserver stopped");
    Ok(())
}

fn api_docs() -> Vec<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    vec![
        ingest_routes::ApiDoc::openapi(),
        relay_routes::ApiDoc::openapi(),
        admin_routes::ApiDoc::openapi(),
        settings_routes::ApiDoc::openapi(),
        reading_routes::ApiDoc::openapi(),
        metric_routes::ApiDoc::openapi(),
    ]
}

/// Any OPTIONS request is an accepted preflight.
fn preflight() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::method().and_then(|method: Method| async move {
        if method == Method::OPTIONS {
            Ok(warp::reply())
        } else {
            Err(warp::reject::not_found())
        }
    })
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, x-client-info, apikey, content-type"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, OPTIONS"),
    );
    headers
}

fn bearer() -> impl Filter<Extract = (Option<String>,), Error = Infallible> + Clone {
    warp::header::optional::<String>("authorization")
        .or(warp::any().map(|| None))
        .unify()
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

/// Request body of at most `JSON_BODY_LIMIT` bytes, left undecoded so the
/// caller can authenticate first. A request without any body yields an
/// empty buffer.
fn raw_body() -> impl Filter<Extract = (Bytes,), Error = warp::Rejection> + Clone {
    let absent = warp::header::optional::<String>("content-length")
        .and(warp::header::optional::<String>("transfer-encoding"))
        .and_then(|len: Option<String>, encoding: Option<String>| async move {
            match (len, encoding) {
                (None, None) => Ok(Bytes::new()),
                _ => Err(warp::reject::not_found()),
            }
        });
    warp::body::content_length_limit(JSON_BODY_LIMIT)
        .and(warp::body::bytes())
        .or(absent)
        .unify()
}

fn build_response<T, E>(resp: Result<T, E>) -> Result<warp::reply::Response, warp::Rejection>
where
    T: Serialize,
    E: Into<HandlerError>,
{
    match resp {
        Ok(data) => Ok(warp::reply::json(&data).into_response()),
        Err(err) => Ok(error_response(err.into())),
    }
}

fn error_response(err: HandlerError) -> warp::reply::Response {
    let status = match &err {
        HandlerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        HandlerError::Forbidden(_) => StatusCode::FORBIDDEN,
        HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
        HandlerError::User(_) => StatusCode::BAD_REQUEST,
        HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("{}", err);
    } else {
        warn!("{}", err);
    }
    json_error(status, err.to_string())
}

fn json_error(status: StatusCode, error: String) -> warp::reply::Response {
    let body = ErrorResponseDto {
        success: false,
        error,
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    use warp::reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, UnsupportedMediaType,
    };

    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_owned())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_owned())
    } else if err.find::<LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_owned())
    } else if let Some(e) = err.find::<UnsupportedMediaType>() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
    } else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<MissingHeader>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<InvalidHeader>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_owned())
    } else {
        warn!("Unhandled rejection: {:?}", err);
        (StatusCode::BAD_REQUEST, "Bad request".to_owned())
    };
    Ok(json_error(status, message))
}
