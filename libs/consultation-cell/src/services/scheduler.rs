// libs/consultation-cell/src/services/scheduler.rs
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailabilitySlot, CancelConsultationRequest, CompleteConsultationRequest, Consultation,
    ConsultationError, ConsultationEvent, ConsultationSettings, ConsultationStatus,
    ScheduleConsultationRequest,
};
use crate::services::availability::{buffered_overlap, SlotAvailabilityService};
use crate::services::lifecycle::ConsultationLifecycleService;
use crate::services::locks::PractitionerLocks;
use crate::services::notify::NotificationDispatcher;

/// Owns the lifecycle of a video consultation booking: availability
/// computation, booking, start/complete/cancel transitions and conflict
/// detection against a practitioner's existing bookings.
pub struct ConsultationScheduler {
    supabase: Arc<SupabaseClient>,
    availability_service: SlotAvailabilityService,
    lifecycle_service: ConsultationLifecycleService,
    locks: Arc<PractitionerLocks>,
    notifier: Arc<dyn NotificationDispatcher>,
    settings: ConsultationSettings,
}

impl ConsultationScheduler {
    pub fn new(
        config: &AppConfig,
        locks: Arc<PractitionerLocks>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self::with_settings(config, locks, notifier, ConsultationSettings::default())
    }

    /// Settings are an explicit constructor argument so tests can run with
    /// their own buffer and pricing instead of sharing process-wide state.
    pub fn with_settings(
        config: &AppConfig,
        locks: Arc<PractitionerLocks>,
        notifier: Arc<dyn NotificationDispatcher>,
        settings: ConsultationSettings,
    ) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let availability_service =
            SlotAvailabilityService::new(Arc::clone(&supabase), settings.clone());

        Self {
            supabase,
            availability_service,
            lifecycle_service: ConsultationLifecycleService::new(),
            locks,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &ConsultationSettings {
        &self.settings
    }

    /// Book a new video consultation for a practitioner.
    pub async fn schedule_consultation(
        &self,
        request: ScheduleConsultationRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        info!(
            "Scheduling consultation for pet {} with practitioner {}",
            request.pet_id, request.practitioner_id
        );

        self.validate_schedule_request(&request)?;

        let end_time =
            request.scheduled_start_time + ChronoDuration::minutes(request.duration_minutes as i64);

        // Hold the practitioner's booking lock across check and insert so two
        // concurrent requests cannot both pass the overlap check.
        let _guard = self.locks.acquire(request.practitioner_id).await;

        let existing = self
            .availability_service
            .consultations_for_day(
                request.practitioner_id,
                request.scheduled_start_time.date_naive(),
                auth_token,
            )
            .await?;

        let conflict = existing.iter().any(|consultation| {
            consultation.is_active()
                && buffered_overlap(
                    request.scheduled_start_time,
                    end_time,
                    consultation.scheduled_start_time,
                    consultation.scheduled_end_time,
                    self.settings.buffer_minutes,
                )
        });

        if conflict {
            warn!(
                "Scheduling conflict for practitioner {} at {}",
                request.practitioner_id, request.scheduled_start_time
            );
            return Err(ConsultationError::SchedulingConflict);
        }

        let consultation = self
            .create_consultation_record(&request, auth_token)
            .await?;

        // Appointment confirmation follows the consultation write; the store
        // offers no cross-table transaction.
        self.update_appointment_status(request.appointment_id, "confirmed", auth_token)
            .await?;

        self.dispatch(ConsultationEvent::Scheduled, &consultation)
            .await;

        info!(
            "Consultation {} scheduled in room {:?}",
            consultation.id, consultation.room_reference
        );
        Ok(consultation)
    }

    /// Move a scheduled consultation into the video session.
    pub async fn start_consultation(
        &self,
        consultation_id: Uuid,
        practitioner_id: Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        debug!("Starting consultation {}", consultation_id);

        let consultation = self.get_consultation(consultation_id, auth_token).await?;

        if consultation.practitioner_id != practitioner_id {
            return Err(ConsultationError::Unauthorized);
        }

        self.lifecycle_service
            .validate_transition(consultation.status, ConsultationStatus::InProgress)?;
        self.lifecycle_service
            .validate_start_window(consultation.scheduled_start_time, Utc::now())?;

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(ConsultationStatus::InProgress));
        patch.insert(
            "actual_start_time".to_string(),
            json!(Utc::now().to_rfc3339()),
        );

        let updated = self
            .patch_consultation_record(consultation_id, patch, auth_token)
            .await?;

        self.dispatch(ConsultationEvent::Started, &updated).await;
        Ok(updated)
    }

    /// Close out an in-progress consultation with its clinical outcome.
    pub async fn complete_consultation(
        &self,
        consultation_id: Uuid,
        request: CompleteConsultationRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        debug!("Completing consultation {}", consultation_id);

        let consultation = self.get_consultation(consultation_id, auth_token).await?;

        if consultation.practitioner_id != request.practitioner_id {
            return Err(ConsultationError::Unauthorized);
        }

        self.lifecycle_service
            .validate_transition(consultation.status, ConsultationStatus::Completed)?;

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(ConsultationStatus::Completed));
        patch.insert(
            "actual_end_time".to_string(),
            json!(Utc::now().to_rfc3339()),
        );
        if let Some(notes) = &request.notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        if let Some(diagnosis) = &request.diagnosis {
            patch.insert("diagnosis".to_string(), json!(diagnosis));
        }
        if let Some(treatment) = &request.treatment {
            patch.insert("treatment".to_string(), json!(treatment));
        }
        if let Some(prescription) = &request.prescription {
            patch.insert("prescription".to_string(), json!(prescription));
        }
        if let Some(recording_url) = &request.recording_url {
            patch.insert("recording_url".to_string(), json!(recording_url));
        }

        let updated = self
            .patch_consultation_record(consultation_id, patch, auth_token)
            .await?;

        self.create_medical_history_entry(&updated, auth_token)
            .await?;

        self.dispatch(ConsultationEvent::Completed, &updated).await;

        info!("Consultation {} completed", consultation_id);
        Ok(updated)
    }

    /// Cancel a scheduled consultation on behalf of its practitioner or the
    /// pet's owner.
    pub async fn cancel_consultation(
        &self,
        consultation_id: Uuid,
        request: CancelConsultationRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        debug!(
            "Cancelling consultation {} (requested by {:?})",
            consultation_id, request.requester_role
        );

        let consultation = self.get_consultation(consultation_id, auth_token).await?;

        if !request
            .requester_role
            .may_cancel(request.requester_id, &consultation)
        {
            warn!(
                "Rejected cancellation of consultation {} by {:?} {}",
                consultation_id, request.requester_role, request.requester_id
            );
            return Err(ConsultationError::Unauthorized);
        }

        self.lifecycle_service
            .validate_transition(consultation.status, ConsultationStatus::Cancelled)?;

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(ConsultationStatus::Cancelled));
        if let Some(reason) = &request.reason {
            patch.insert("cancellation_reason".to_string(), json!(reason));
        }

        let updated = self
            .patch_consultation_record(consultation_id, patch, auth_token)
            .await?;

        self.update_appointment_status(updated.appointment_id, "cancelled", auth_token)
            .await?;

        self.dispatch(ConsultationEvent::Cancelled, &updated).await;

        info!("Consultation {} cancelled", consultation_id);
        Ok(updated)
    }

    /// The practitioner's 30-minute slot grid for one day.
    pub async fn get_availability(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<AvailabilitySlot>, ConsultationError> {
        self.availability_service
            .day_slots(practitioner_id, date, auth_token)
            .await
    }

    /// The practitioner's consultations for one day, ordered by start time.
    pub async fn list_for_practitioner(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        self.availability_service
            .consultations_for_day(practitioner_id, date, auth_token)
            .await
    }

    /// Get consultation by ID
    pub async fn get_consultation(
        &self,
        consultation_id: Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::Dependency(e.to_string()))?;

        if result.is_empty() {
            return Err(ConsultationError::NotFound);
        }

        serde_json::from_value(result[0].clone()).map_err(|e| {
            ConsultationError::Dependency(format!("Failed to parse consultation: {}", e))
        })
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    fn validate_schedule_request(
        &self,
        request: &ScheduleConsultationRequest,
    ) -> Result<(), ConsultationError> {
        if request.duration_minutes <= 0 {
            return Err(ConsultationError::Validation(
                "Consultation duration must be positive".to_string(),
            ));
        }

        if request.duration_minutes > self.settings.max_duration_minutes {
            return Err(ConsultationError::Validation(format!(
                "Consultation duration cannot exceed {} minutes",
                self.settings.max_duration_minutes
            )));
        }

        if !self.settings.is_specialty_enabled(&request.specialty) {
            return Err(ConsultationError::Validation(format!(
                "Specialty not offered for telemedicine: {}",
                request.specialty
            )));
        }

        if request.scheduled_start_time <= Utc::now() {
            return Err(ConsultationError::Validation(
                "Consultation must be scheduled for a future time".to_string(),
            ));
        }

        Ok(())
    }

    async fn create_consultation_record(
        &self,
        request: &ScheduleConsultationRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let now = Utc::now();
        let end_time =
            request.scheduled_start_time + ChronoDuration::minutes(request.duration_minutes as i64);
        let room_reference = format!("vetroom-{}", Uuid::new_v4().simple());
        let fee = self
            .settings
            .fee_for(&request.specialty, request.duration_minutes);

        let consultation_data = json!({
            "appointment_id": request.appointment_id,
            "pet_id": request.pet_id,
            "owner_id": request.owner_id,
            "practitioner_id": request.practitioner_id,
            "scheduled_start_time": request.scheduled_start_time.to_rfc3339(),
            "scheduled_end_time": end_time.to_rfc3339(),
            "duration_minutes": request.duration_minutes,
            "status": ConsultationStatus::Scheduled.to_string(),
            "specialty": request.specialty,
            "fee": fee,
            "room_reference": room_reference,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/consultations",
                Some(auth_token),
                Some(consultation_data),
                Some(headers),
            )
            .await
            .map_err(|e| ConsultationError::Dependency(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(ConsultationError::Dependency(
                "Failed to create consultation".to_string(),
            ));
        };

        serde_json::from_value(row).map_err(|e| {
            ConsultationError::Dependency(format!("Failed to parse created consultation: {}", e))
        })
    }

    async fn patch_consultation_record(
        &self,
        consultation_id: Uuid,
        mut patch: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(patch)),
                Some(headers),
            )
            .await
            .map_err(|e| ConsultationError::Dependency(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(ConsultationError::Dependency(
                "Failed to update consultation".to_string(),
            ));
        };

        serde_json::from_value(row).map_err(|e| {
            ConsultationError::Dependency(format!("Failed to parse updated consultation: {}", e))
        })
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: &str,
        auth_token: &str,
    ) -> Result<(), ConsultationError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let patch = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(patch), Some(headers))
            .await
            .map_err(|e| {
                ConsultationError::Dependency(format!(
                    "Failed to mark appointment {} as {}: {}",
                    appointment_id, status, e
                ))
            })?;

        Ok(())
    }

    async fn create_medical_history_entry(
        &self,
        consultation: &Consultation,
        auth_token: &str,
    ) -> Result<(), ConsultationError> {
        let description = consultation
            .diagnosis
            .clone()
            .or_else(|| consultation.notes.clone())
            .unwrap_or_else(|| "Telemedicine consultation".to_string());

        let entry = json!({
            "pet_id": consultation.pet_id,
            "consultation_id": consultation.id,
            "practitioner_id": consultation.practitioner_id,
            "record_type": "Telemedicine Consultation",
            "description": description,
            "treatment": consultation.treatment,
            "prescription": consultation.prescription,
            "recorded_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/medical_history",
                Some(auth_token),
                Some(entry),
                Some(headers),
            )
            .await
            .map_err(|e| {
                ConsultationError::Dependency(format!(
                    "Failed to record medical history for pet {}: {}",
                    consultation.pet_id, e
                ))
            })?;

        Ok(())
    }

    /// Non-propagating notification boundary: persistence is the operation's
    /// primary effect, so dispatch failures are logged and swallowed.
    async fn dispatch(&self, event: ConsultationEvent, consultation: &Consultation) {
        if let Err(e) = self.notifier.notify(event, consultation).await {
            warn!(
                "Failed to dispatch {} notification for consultation {}: {}",
                event, consultation.id, e
            );
        }
    }
}
