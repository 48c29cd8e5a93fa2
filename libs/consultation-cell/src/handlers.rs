// libs/consultation-cell/src/handlers.rs
use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    CancelConsultationRequest, CompleteConsultationRequest, ConsultationError,
    ScheduleConsultationRequest, StartConsultationRequest,
};
use crate::router::ConsultationCellState;
use crate::services::scheduler::ConsultationScheduler;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct PractitionerDayQuery {
    pub date: NaiveDate,
}

fn scheduler(state: &ConsultationCellState) -> ConsultationScheduler {
    ConsultationScheduler::with_settings(
        &state.config,
        state.locks.clone(),
        state.notifier.clone(),
        state.settings.clone(),
    )
}

fn map_domain_error(e: ConsultationError) -> AppError {
    match e {
        ConsultationError::NotFound => AppError::NotFound("Consultation not found".to_string()),
        ConsultationError::Unauthorized => {
            AppError::Forbidden("Not authorized for this consultation".to_string())
        }
        ConsultationError::InvalidState(status) => {
            AppError::BadRequest(format!("Operation not allowed while {}", status))
        }
        ConsultationError::OutsideStartWindow => AppError::BadRequest(
            "Consultation can only be started within 5 minutes of its scheduled time".to_string(),
        ),
        ConsultationError::SchedulingConflict => {
            AppError::Conflict("Requested time conflicts with an existing booking".to_string())
        }
        ConsultationError::Validation(msg) => AppError::BadRequest(msg),
        ConsultationError::Dependency(msg) => AppError::ExternalService(msg),
    }
}

// ==============================================================================
// CONSULTATION LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn schedule_consultation(
    State(state): State<std::sync::Arc<ConsultationCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ScheduleConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let consultation = scheduler(&state)
        .schedule_consultation(request, auth.token())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": consultation,
        "message": "Consultation scheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_consultation(
    State(state): State<std::sync::Arc<ConsultationCellState>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let consultation = scheduler(&state)
        .get_consultation(consultation_id, auth.token())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(json!(consultation)))
}

#[axum::debug_handler]
pub async fn start_consultation(
    State(state): State<std::sync::Arc<ConsultationCellState>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<StartConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let consultation = scheduler(&state)
        .start_consultation(consultation_id, request.practitioner_id, auth.token())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": consultation
    })))
}

#[axum::debug_handler]
pub async fn complete_consultation(
    State(state): State<std::sync::Arc<ConsultationCellState>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CompleteConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let consultation = scheduler(&state)
        .complete_consultation(consultation_id, request, auth.token())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": consultation
    })))
}

#[axum::debug_handler]
pub async fn cancel_consultation(
    State(state): State<std::sync::Arc<ConsultationCellState>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CancelConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let consultation = scheduler(&state)
        .cancel_consultation(consultation_id, request, auth.token())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": consultation,
        "message": "Consultation cancelled"
    })))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<std::sync::Arc<ConsultationCellState>>,
    Query(query): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let slots = scheduler(&state)
        .get_availability(query.practitioner_id, query.date, auth.token())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(json!({
        "practitioner_id": query.practitioner_id,
        "date": query.date,
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_practitioner_day(
    State(state): State<std::sync::Arc<ConsultationCellState>>,
    Path(practitioner_id): Path<Uuid>,
    Query(query): Query<PractitionerDayQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let consultations = scheduler(&state)
        .list_for_practitioner(practitioner_id, query.date, auth.token())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(json!({
        "practitioner_id": practitioner_id,
        "date": query.date,
        "consultations": consultations
    })))
}
