//! HTTP front end for registrations.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint
//! - `POST /register`: Submit a registration form (JSON body)
//! - `GET /users/{id}`: Fetch a stored user record

mod guard;

pub use guard::{SubmissionGuard, SubmissionTicket};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::models::{RegistrationForm, UserId};
use crate::notify::{Notice, RecordingSink};
use crate::registration::{Outcome, Registrar, RegistrationError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registrar: Registrar,
    pub guard: Arc<SubmissionGuard>,
}

impl AppState {
    pub fn new(registrar: Registrar) -> Self {
        Self {
            registrar,
            guard: Arc::new(SubmissionGuard::new()),
        }
    }
}

/// Build the router with all routes and tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/users/{id}", get(get_user))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::version(),
    })
}

#[derive(Serialize)]
struct RegisterResponse {
    outcome: Outcome,
    notice: Notice,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    notice: Notice,
}

fn error_response(status: StatusCode, error: &'static str, notice: Notice) -> Response {
    (status, Json(ErrorResponse { error, notice })).into_response()
}

/// HTTP status for a failed registration.
pub fn status_for(error: &RegistrationError) -> StatusCode {
    match error {
        RegistrationError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RegistrationError::DuplicateAccount => StatusCode::CONFLICT,
        RegistrationError::AuthFailure(_) => StatusCode::BAD_REQUEST,
        RegistrationError::InvalidCode => StatusCode::NOT_FOUND,
        RegistrationError::StoreReadFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        RegistrationError::StoreWriteFailure { .. }
        | RegistrationError::StoreUpdateFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn register(State(state): State<AppState>, Json(form): Json<RegistrationForm>) -> Response {
    // Hold the email for the whole submission; a form without an email
    // fails validation before any remote call
    let ticket = match form.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => match state.guard.begin(email) {
            Some(ticket) => Some(ticket),
            None => {
                tracing::warn!("Rejected duplicate submission for {}", email);
                return error_response(
                    StatusCode::CONFLICT,
                    "submission_in_flight",
                    Notice::failure("A registration for this email is already in progress."),
                );
            }
        },
        _ => None,
    };

    // The submission runs on its own task so a dropped connection cannot
    // stop it between steps. The ticket is released when the task ends.
    let registrar = state.registrar.clone();
    let submission = tokio::spawn(async move {
        let _ticket = ticket;
        let sink = RecordingSink::new();
        let result = registrar.handle(&form, &sink).await;
        let notice = sink
            .notices()
            .pop()
            .unwrap_or_else(|| Notice::from_result(&result));
        (result, notice)
    });

    let (result, notice) = match submission.await {
        Ok(finished) => finished,
        Err(e) => {
            tracing::error!("Registration task failed: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                Notice::failure("Registration failed unexpectedly."),
            );
        }
    };

    match result {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(RegisterResponse { outcome, notice }),
        )
            .into_response(),
        Err(e) => error_response(status_for(&e), e.code(), notice),
    }
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registrar.store().get_document(&UserId::from(id)).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            Notice::failure("User not found."),
        ),
        Err(e) => {
            tracing::error!("Failed to fetch user: {}", e);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_read_failure",
                Notice::failure(format!("Error fetching user: {}", e)),
            )
        }
    }
}
