use std::sync::Arc;
use utoipa::openapi::path::PathsBuilder;
use utoipa::openapi::schema::ComponentsBuilder;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::tag::Tag;
use utoipa::openapi::{InfoBuilder, OpenApi, OpenApiBuilder};
use utoipa_swagger_ui::Config;
use warp::Filter;
use warp::{
    http::Uri,
    hyper::{Response, StatusCode},
    path::{FullPath, Tail},
    Rejection, Reply,
};

const SPEC_URL: &str = "/api/doc/api.json";

/// Merges the per module documents and serves them with the swagger UI.
pub fn swagger(
    mut specs: Vec<OpenApi>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let mut tags: Vec<Tag> = Vec::new();
    let mut paths = PathsBuilder::new();
    let mut components = ComponentsBuilder::new().security_scheme(
        "bearer_auth",
        SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
    );

    for spec in specs.drain(..) {
        for tag in spec.tags.iter() {
            tags.append(&mut tag.clone());
        }
        for (key, value) in spec.paths.paths.iter() {
            paths = paths.path(key, value.clone());
        }
        if let Some(spec_components) = &spec.components {
            for (key, value) in spec_components.schemas.iter() {
                components = components.schema(key, value.clone());
            }
            for (key, value) in spec_components.responses.iter() {
                components = components.response(key, value.clone());
            }
            for (key, value) in spec_components.security_schemes.iter() {
                components = components.security_scheme(key, value.clone());
            }
        }
    }

    let merged_api = OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(env!("CARGO_PKG_NAME"))
                .version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
        .tags(Some(tags))
        .paths(paths.build())
        .components(Some(components.build()))
        .build();
    let config = Arc::new(Config::new([SPEC_URL]));

    warp::path!("api" / "doc" / "api.json")
        .and(warp::get())
        .map(move || warp::reply::json(&merged_api))
        .or(warp::path("api")
            .and(warp::path("doc"))
            .and(warp::get())
            .and(warp::path::full())
            .and(warp::path::tail())
            .and(warp::any().map(move || config.clone()))
            .and_then(serve_swagger))
}

async fn serve_swagger(
    full_path: FullPath,
    tail: Tail,
    config: Arc<Config<'static>>,
) -> Result<Box<dyn Reply + 'static>, Rejection> {
    if full_path.as_str() == "/api/doc" {
        return Ok(Box::new(warp::redirect::found(Uri::from_static(
            "/api/doc/",
        ))));
    }

    match utoipa_swagger_ui::serve(tail.as_str(), config) {
        Ok(Some(file)) => Ok(Box::new(
            Response::builder()
                .header("Content-Type", file.content_type)
                .body(file.bytes),
        )),
        Ok(None) => Ok(Box::new(StatusCode::NOT_FOUND)),
        Err(error) => Ok(Box::new(
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(error.to_string()),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_merged_document() {
        // Prepare
        let routes = swagger(crate::rest::api_docs());

        // Execute
        let res = warp::test::request()
            .path("/api/doc/api.json")
            .reply(&routes)
            .await;

        // Validate
        assert_eq!(200, res.status());
        let doc: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            "/api/ingest/json",
            "/api/ingest/form",
            "/api/relay",
            "/api/admin/users",
            "/api/settings",
            "/api/readings/latest",
            "/api/health",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    #[tokio::test]
    async fn test_doc_redirect() {
        let routes = swagger(Vec::new());

        let res = warp::test::request().path("/api/doc").reply(&routes).await;

        assert_eq!(302, res.status());
    }
}
