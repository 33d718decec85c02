use super::build_response;
use crate::handlers::AppState;
use std::sync::Arc;
use utoipa::OpenApi;
use warp::Filter;

#[derive(OpenApi)]
#[openapi(
    paths(health),
    components(schemas(dto::HealthyDto)),
    tags((name = "metric", description = "Service health"))
)]
pub struct ApiDoc;

pub fn routes(
    state: &Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    health(state.clone())
}

/// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = dto::HealthyDto)),
    tag = "metric"
)]
fn health(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "health"))
        .and(warp::get())
        .and_then(|state: Arc<AppState>| async move {
            let ret = dto::HealthyDto {
                healthy: true,
                database_state: state.check_db().await,
            };
            build_response::<_, crate::error::HandlerError>(Ok(ret))
        })
        .boxed()
}

mod dto {
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;

    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct HealthyDto {
        pub healthy: bool,
        pub database_state: String,
    }
}
