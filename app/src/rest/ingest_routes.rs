use super::{build_response, raw_body, ErrorResponseDto, JSON_BODY_LIMIT};
use crate::error::IngestError;
use crate::handlers::ingest::{
    AudioUpload, FormIngestResponseDto, FormIngestedDto, FormSubmission, JsonIngestResponseDto,
    JsonIngestedDto, JsonReadingDto,
};
use crate::handlers::AppState;
use futures::TryStreamExt;
use std::sync::Arc;
use utoipa::OpenApi;
use warp::hyper::body::{Buf, Bytes};
use warp::multipart::{FormData, Part};
use warp::Filter;

const AUDIO_FIELD: &str = "audio_file";

#[derive(OpenApi)]
#[openapi(
    paths(ingest_json, ingest_form),
    components(schemas(
        JsonReadingDto,
        JsonIngestResponseDto,
        JsonIngestedDto,
        FormIngestResponseDto,
        FormIngestedDto,
        ErrorResponseDto
    )),
    tags((name = "ingest", description = "Sensor data intake"))
)]
pub struct ApiDoc;

pub fn routes(
    state: &Arc<AppState>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    ingest_json(state.clone()).or(ingest_form(state.clone(), max_upload_bytes))
}

/// POST /api/ingest/json
///
/// Store the climate values of the periodic gateway
///
/// Every failure, including a malformed body, answers 500
#[utoipa::path(
    post,
    path = "/api/ingest/json",
    request_body = JsonReadingDto,
    responses(
        (status = 200, description = "Reading stored", body = JsonIngestResponseDto),
        (status = 500, description = "Invalid payload or storage failure", body = ErrorResponseDto)
    ),
    tag = "ingest"
)]
fn ingest_json(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let body = raw_body()
        .map(Ok::<_, IngestError>)
        .or(warp::any().map(|| {
            Err::<Bytes, _>(IngestError::Body(format!(
                "expected at most {} bytes of JSON",
                JSON_BODY_LIMIT
            )))
        }))
        .unify();

    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "ingest" / "json"))
        .and(warp::post())
        .and(body)
        .and_then(
            |state: Arc<AppState>, body: Result<Bytes, IngestError>| async move {
                let resp = match body {
                    Ok(body) => state.ingest_json(&body).await,
                    Err(err) => Err(err),
                };
                build_response(resp)
            },
        )
        .boxed()
}

/// POST /api/ingest/form
///
/// Store a full webhook reading with an optional `audio_file` clip
///
/// Every failure answers 500
#[utoipa::path(
    post,
    path = "/api/ingest/form",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "Fields temperature, humidity, soil_moisture, nitrogen, phosphorus, potassium, auto_message and an optional audio_file"
    ),
    responses(
        (status = 200, description = "Reading stored", body = FormIngestResponseDto),
        (status = 500, description = "Invalid form, upload or storage failure", body = ErrorResponseDto)
    ),
    tag = "ingest"
)]
fn ingest_form(
    state: Arc<AppState>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let form = warp::multipart::form()
        .max_length(max_upload_bytes)
        .map(|form: FormData| Ok::<_, IngestError>(form))
        .or(warp::any().map(|| {
            Err::<FormData, _>(IngestError::Multipart(
                "Expected a multipart/form-data body".to_owned(),
            ))
        }))
        .unify();

    warp::any()
        .map(move || state.clone())
        .and(warp::path!("api" / "ingest" / "form"))
        .and(warp::post())
        .and(form)
        .and_then(
            |state: Arc<AppState>, form: Result<FormData, IngestError>| async move {
                let resp = match form {
                    Ok(form) => match collect_form(form).await {
                        Ok(submission) => state.ingest_form(submission).await,
                        Err(err) => Err(err),
                    },
                    Err(err) => Err(err),
                };
                build_response(resp)
            },
        )
        .boxed()
}

async fn collect_form(form: FormData) -> Result<FormSubmission, IngestError> {
    let mut parts: Vec<Part> = form
        .try_collect()
        .await
        .map_err(|e| IngestError::Multipart(e.to_string()))?;

    let mut submission = FormSubmission::default();
    for part in parts.drain(..) {
        let name = part.name().to_owned();
        if name == AUDIO_FIELD {
            let filename = part.filename().map(str::to_owned);
            let content_type = part.content_type().map(str::to_owned);
            submission.audio = Some(AudioUpload {
                filename,
                content_type,
                bytes: read_part(part).await?,
            });
        } else {
            let bytes = read_part(part).await?;
            let text = String::from_utf8(bytes)
                .map_err(|_| IngestError::Multipart(format!("Field {} is not UTF-8", name)))?;
            submission.fields.insert(name, text);
        }
    }
    Ok(submission)
}

async fn read_part(part: Part) -> Result<Vec<u8>, IngestError> {
    part.stream()
        .try_fold(Vec::new(), |mut acc, mut buf| async move {
            let chunk = buf.copy_to_bytes(buf.remaining());
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .map_err(|e| IngestError::Multipart(e.to_string()))
}
