//! HTTP surface: routing, query parsing and error mapping.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Json;
use devlab::{CapabilityQuery, DeviceLab, ErrorCode, LabError};
use devlab_protocol::{ApiEnvelope, CapabilityRecord, ErrorBody, LeaseCreated, LeaseRequest};
use serde_json::{Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

/// Builds the API router, every route nested under the configured base path.
pub fn router(lab: Arc<DeviceLab>) -> Router {
	let base = lab.config().api_base_url.clone();
	let cors = CorsLayer::new()
		.allow_origin(Any)
		.allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
		.allow_headers([HeaderName::from_static("x-requested-with"), header::CONTENT_TYPE]);

	Router::new()
		.route(&format!("{base}capabilities"), get(list_capabilities))
		.route(&format!("{base}leases"), post(create_lease))
		.route(&format!("{base}leases/{{token}}"), delete(release_lease))
		.layer(cors)
		.with_state(lab)
}

/// [`LabError`] rendered as a `{code, data: {message}}` response.
#[derive(Debug)]
pub struct ApiError(LabError);

impl From<LabError> for ApiError {
	fn from(err: LabError) -> Self {
		Self(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let code = self.0.code();
		let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		match code {
			ErrorCode::InternalError | ErrorCode::UpstreamUnavailable => {
				error!(target = "devlab.http", error = %self.0, code = %code, "request failed");
			}
			_ => debug!(target = "devlab.http", error = %self.0, code = %code, "request rejected"),
		}

		let body = ApiEnvelope::new(
			status.as_u16(),
			ErrorBody {
				message: self.0.to_string(),
				error_code: Some(code.to_string()),
			},
		);
		(status, Json(body)).into_response()
	}
}

async fn list_capabilities(State(lab): State<Arc<DeviceLab>>, RawQuery(raw): RawQuery) -> Result<Json<ApiEnvelope<Vec<CapabilityRecord>>>, ApiError> {
	let (query, debug) = parse_capability_query(raw.as_deref().unwrap_or_default());
	let records = lab.capabilities(&query, debug)?;
	Ok(Json(ApiEnvelope::new(StatusCode::OK.as_u16(), records)))
}

async fn create_lease(State(lab): State<Arc<DeviceLab>>, body: Bytes) -> Result<(StatusCode, Json<ApiEnvelope<LeaseCreated>>), ApiError> {
	let request: LeaseRequest =
		serde_json::from_slice(&body).map_err(|e| LabError::InvalidInput(format!("expected {{\"capability_token\": string, \"timeout\": integer}}: {e}")))?;
	let lease = lab.acquire(&request.capability_token, request.timeout)?;

	let status = StatusCode::CREATED;
	Ok((status, Json(ApiEnvelope::new(status.as_u16(), LeaseCreated { token: lease.token }))))
}

async fn release_lease(State(lab): State<Arc<DeviceLab>>, Path(token): Path<String>) -> Result<Json<ApiEnvelope<Value>>, ApiError> {
	lab.release(&token)?;
	Ok(Json(ApiEnvelope::new(StatusCode::OK.as_u16(), Value::Object(Map::new()))))
}

/// Parses the capabilities query string.
///
/// List parameters may repeat and may carry a `[]` suffix. Empty scalar
/// values count as absent. Returns the query and whether `debug` was asked for.
pub fn parse_capability_query(raw: &str) -> (CapabilityQuery, bool) {
	let mut query = CapabilityQuery::default();
	let mut debug = false;
	let non_empty = |value: String| Some(value).filter(|v| !v.is_empty());

	for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
		let value = value.into_owned();
		match key.as_ref() {
			"platform_name" => query.platform_name = non_empty(value),
			"platform_version" | "platform_version[]" => query.platform_versions.push(value),
			"device_name" | "device_name[]" => query.device_names.push(value),
			"min_platform_version" => query.min_version = non_empty(value),
			"max_platform_version" => query.max_version = non_empty(value),
			"debug" => debug = matches!(value.to_ascii_lowercase().as_str(), "" | "1" | "true" | "yes" | "on"),
			_ => {}
		}
	}
	(query, debug)
}
