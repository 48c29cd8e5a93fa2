// libs/consultation-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE CONSULTATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub pet_id: Uuid,
    pub owner_id: Uuid,
    pub practitioner_id: Uuid,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: ConsultationStatus,
    pub specialty: String,
    pub fee: f64,
    pub room_reference: Option<String>,
    pub recording_url: Option<String>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub cancellation_reason: Option<String>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    /// Whether this consultation still occupies its practitioner's calendar.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConsultationStatus::Scheduled | ConsultationStatus::InProgress
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    // Only set by external fault paths (e.g. video backend outage), never by
    // the scheduling operations themselves.
    Failed,
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationStatus::Scheduled => write!(f, "scheduled"),
            ConsultationStatus::InProgress => write!(f, "in_progress"),
            ConsultationStatus::Completed => write!(f, "completed"),
            ConsultationStatus::Cancelled => write!(f, "cancelled"),
            ConsultationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Derived per-day view of a practitioner's calendar. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilitySlot {
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub available: bool,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConsultationRequest {
    pub appointment_id: Uuid,
    pub pet_id: Uuid,
    pub owner_id: Uuid,
    pub practitioner_id: Uuid,
    pub scheduled_start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub specialty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConsultationRequest {
    pub practitioner_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteConsultationRequest {
    pub practitioner_id: Uuid,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub recording_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelConsultationRequest {
    pub requester_id: Uuid,
    pub requester_role: RequesterRole,
    pub reason: Option<String>,
}

/// Closed set of caller roles. Cancellation authorization is an explicit
/// predicate so new roles cannot silently slip past a string comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequesterRole {
    Practitioner,
    Owner,
    Receptionist,
    VetTech,
    Manager,
    Admin,
}

impl RequesterRole {
    /// A practitioner may cancel only their own consultations; an owner only
    /// consultations booked under their owner id. Everyone else is rejected.
    pub fn may_cancel(&self, requester_id: Uuid, consultation: &Consultation) -> bool {
        match self {
            RequesterRole::Practitioner => requester_id == consultation.practitioner_id,
            RequesterRole::Owner => requester_id == consultation.owner_id,
            _ => false,
        }
    }
}

// ==============================================================================
// SETTINGS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct ConsultationSettings {
    pub max_duration_minutes: i32,
    pub buffer_minutes: i32,
    pub enabled_specialties: Vec<String>,
    pub pricing: ConsultationPricing,
}

#[derive(Debug, Clone)]
pub struct ConsultationPricing {
    pub standard: f64,
    pub extended: f64,
    pub follow_up: f64,
}

impl Default for ConsultationSettings {
    fn default() -> Self {
        Self {
            max_duration_minutes: 60,
            buffer_minutes: 15,
            enabled_specialties: vec![
                "general".to_string(),
                "dermatology".to_string(),
                "behavior".to_string(),
                "nutrition".to_string(),
                "cardiology".to_string(),
                "follow_up".to_string(),
            ],
            pricing: ConsultationPricing {
                standard: 75.0,
                extended: 120.0,
                follow_up: 50.0,
            },
        }
    }
}

impl ConsultationSettings {
    pub fn is_specialty_enabled(&self, specialty: &str) -> bool {
        self.enabled_specialties
            .iter()
            .any(|s| s.eq_ignore_ascii_case(specialty))
    }

    /// Flat rate selection: follow-ups get the follow-up rate, anything over
    /// 40 minutes bills as an extended session.
    pub fn fee_for(&self, specialty: &str, duration_minutes: i32) -> f64 {
        if specialty.eq_ignore_ascii_case("follow_up") {
            self.pricing.follow_up
        } else if duration_minutes > 40 {
            self.pricing.extended
        } else {
            self.pricing.standard
        }
    }
}

// ==============================================================================
// NOTIFICATION EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationEvent {
    Scheduled,
    Started,
    Completed,
    Cancelled,
}

impl fmt::Display for ConsultationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationEvent::Scheduled => write!(f, "scheduled"),
            ConsultationEvent::Started => write!(f, "started"),
            ConsultationEvent::Completed => write!(f, "completed"),
            ConsultationEvent::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,

    #[error("Caller is not authorized for this consultation")]
    Unauthorized,

    #[error("Operation not allowed in current status: {0}")]
    InvalidState(ConsultationStatus),

    #[error("Consultation can only be started within 5 minutes of its scheduled time")]
    OutsideStartWindow,

    #[error("Requested time conflicts with an existing booking")]
    SchedulingConflict,

    #[error("Validation error: {0}")]
    Validation(String),

    // Infrastructure failures (store or dispatcher), kept distinct from the
    // domain rejections above so callers can decide what is retryable.
    #[error("Dependency failure: {0}")]
    Dependency(String),
}
