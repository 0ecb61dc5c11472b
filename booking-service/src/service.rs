use axum::{
    Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::models::ServiceSummary;
use crate::wizard::{BookingWizard, WizardCommand, WizardError, WizardView};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn error_body(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn wizard_error(e: WizardError) -> ApiError {
    match &e {
        WizardError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": e.to_string(),
                "session_id": id
            })),
        ),
        WizardError::Completed(id) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": e.to_string(),
                "session_id": id
            })),
        ),
        WizardError::Rejected(message) => error_body(StatusCode::UNPROCESSABLE_ENTITY, message),
        WizardError::Engine(inner) => {
            error!(error = %inner, "wizard engine failure");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal wizard error")
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub wizard: BookingWizard,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/services", get(list_services))
        .route("/wizard", post(open_wizard))
        .route("/wizard/{session_id}", get(get_wizard).delete(cancel_wizard))
        .route("/wizard/{session_id}/commands", post(apply_command))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tag every request with a correlation id, reusing the caller's when it
/// sends one, and echo it on the response.
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header = HeaderValue::from_str(&correlation_id).ok();
    if let Some(header) = &header {
        request
            .headers_mut()
            .insert(CORRELATION_HEADER, header.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Some(header) = header {
        response.headers_mut().insert(CORRELATION_HEADER, header);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Booking Wizard Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /services": "List bookable services",
            "POST /wizard": "Open a booking wizard session",
            "GET /wizard/{session_id}": "Current state of a wizard session",
            "DELETE /wizard/{session_id}": "Cancel a wizard session",
            "POST /wizard/{session_id}/commands": "Apply a command to a wizard session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_services(State(state): State<AppState>) -> ApiResult<Vec<ServiceSummary>> {
    state
        .wizard
        .services()
        .get_unique_service_ids()
        .await
        .map(Json)
        .map_err(|e| {
            warn!(error = %e, "service catalogue request failed");
            error_body(StatusCode::BAD_GATEWAY, &e.user_message())
        })
}

async fn open_wizard(State(state): State<AppState>) -> Result<(StatusCode, Json<WizardView>), ApiError> {
    let view = state.wizard.open().await.map_err(wizard_error)?;
    info!(session_id = %view.session_id, "wizard session created");
    Ok((StatusCode::CREATED, Json(view)))
}

async fn cancel_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.wizard.cancel(&session_id).await.map_err(wizard_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<WizardView> {
    state
        .wizard
        .view(&session_id)
        .await
        .map(Json)
        .map_err(wizard_error)
}

async fn apply_command(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(command): Json<WizardCommand>,
) -> ApiResult<WizardView> {
    info!(session_id = %session_id, command = ?command, "applying wizard command");
    state
        .wizard
        .apply(&session_id, command)
        .await
        .map(Json)
        .map_err(wizard_error)
}
