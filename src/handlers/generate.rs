use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{GatewayError, ValidationError};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{GenerateBody, GenerateResponse};
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Response {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();
    let request_id = Uuid::new_v4();

    let result = match payload {
        Ok(Json(body)) => state.pipeline.run(body, request_id).await,
        Err(rejection) => Err(GatewayError::from(ValidationError::MalformedBody(
            rejection.body_text(),
        ))),
    };

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    let mut response = match result {
        Ok(generated) => Json(GenerateResponse::from(generated)).into_response(),
        Err(err) => err.into_response(),
    };
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
