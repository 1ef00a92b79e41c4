//! HTTP server for the freight quoting API.
//!
//! This module provides the axum routing, shared state, and handlers for
//! `POST /calculate`, `GET /nearest-serviceable`, and the UTSF admin
//! CRUD endpoints.

use axum::{
	extract::{Path, Query, State},
	response::Json,
	routing::{delete, get, post},
	Router,
};
use freight_config::ApiConfig;
use freight_types::api::{APIError, CalculateRequest, CalculateResponse, NearestServiceableRequest, NearestServiceableResponse};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::AppEngine;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<AppEngine>,
}

/// Starts the HTTP server for the API.
///
/// This function creates and configures the HTTP server with routing,
/// middleware, and error handling for every endpoint.
pub async fn start_server(api_config: ApiConfig, engine: Arc<AppEngine>) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { engine };

	let app = Router::new()
		.route("/calculate", post(handle_calculate))
		.route("/nearest-serviceable", get(handle_nearest_serviceable))
		.nest(
			"/admin/carriers",
			Router::new()
				.route("/", post(handle_add_carrier))
				.route("/{id}", delete(handle_remove_carrier))
				.route("/reload", post(handle_reload_all))
				.route("/{id}/reload", post(handle_reload_one)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Freight quoting API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles `POST /calculate`.
///
/// Runs the full quoting pipeline for one request: validation, cache lookup,
/// distance resolution, carrier fetch and hot-switch merge, per-carrier
/// pricing fan-out, and the `SmartShield` anomaly pass.
async fn handle_calculate(
	State(state): State<AppState>,
	Json(request): Json<CalculateRequest>,
) -> Result<Json<CalculateResponse>, APIError> {
	state.engine.quotes.calculate(request).await.map(Json).map_err(to_api_error)
}

/// Handles `GET /nearest-serviceable`.
///
/// Suggests a serviceable pincode close to an unserviceable destination,
/// verified by actually pricing it against the owner's carriers.
async fn handle_nearest_serviceable(
	State(state): State<AppState>,
	Query(request): Query<NearestServiceableRequest>,
) -> Json<NearestServiceableResponse> {
	let result = freight_engine::find_nearest_pincode(
		state.engine.utsf.as_ref(),
		&state.engine.db,
		state.engine.zones.as_ref(),
		state.engine.centroids.as_ref(),
		&freight_types::domain::Pincode::new(request.from_pincode),
		&freight_types::domain::Pincode::new(request.pincode),
		request.customer_id.as_deref(),
	)
	.await;

	Json(NearestServiceableResponse {
		nearest_pincode: result.nearest_pincode,
		distance_km: result.distance_km,
		served_by: result.served_by,
	})
}

/// Handles `POST /admin/carriers` — adds (or replaces) a UTSF carrier file.
///
/// Not part of the hot path; kept as a thin wrapper over `UTSFRegistry::add`.
async fn handle_add_carrier(
	State(state): State<AppState>,
	Json(file): Json<freight_carriers::utsf::UtsfFile>,
) -> Result<Json<serde_json::Value>, APIError> {
	let carrier = state.engine.utsf.add(file).await.map_err(carrier_error_to_api)?;
	Ok(Json(serde_json::json!({ "id": carrier.id })))
}

/// Handles `DELETE /admin/carriers/{id}` — removes a UTSF carrier by id.
async fn handle_remove_carrier(State(state): State<AppState>, Path(id): Path<String>) -> Json<serde_json::Value> {
	let removed = state.engine.utsf.remove(&id).is_some();
	Json(serde_json::json!({ "removed": removed }))
}

/// Handles `POST /admin/carriers/reload` — rescans the whole UTSF directory.
async fn handle_reload_all(State(state): State<AppState>) -> Result<Json<serde_json::Value>, APIError> {
	state.engine.utsf.reload().await.map_err(carrier_error_to_api)?;
	Ok(Json(serde_json::json!({ "reloaded": true })))
}

/// Handles `POST /admin/carriers/{id}/reload` — rereads a single UTSF file.
async fn handle_reload_one(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, APIError> {
	let carrier = state.engine.utsf.reload_one(&id).await.map_err(carrier_error_to_api)?;
	Ok(Json(serde_json::json!({ "id": carrier.id })))
}

/// Maps `EngineError` to the structured `APIError` response, splitting
/// user-input failures (400) from upstream-service failures (500/503).
fn to_api_error(err: freight_engine::EngineError) -> APIError {
	let code = err.error_code().to_string();
	let message = err.to_string();
	if err.is_user_input_error() {
		APIError::BadRequest { error_type: code, message, details: None }
	} else {
		APIError::InternalServerError { error_type: code, message }
	}
}

fn carrier_error_to_api(err: freight_carriers::CarrierError) -> APIError {
	APIError::UnprocessableEntity { error_type: "CARRIER_SOURCE_ERROR".to_string(), message: err.to_string(), details: None }
}
