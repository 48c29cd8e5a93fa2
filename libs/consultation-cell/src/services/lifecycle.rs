// libs/consultation-cell/src/services/lifecycle.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{ConsultationError, ConsultationStatus};

/// How far from the scheduled time a practitioner may start the session,
/// in either direction.
pub const START_WINDOW_MINUTES: i64 = 5;

pub struct ConsultationLifecycleService;

impl ConsultationLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_transition(
        &self,
        current: ConsultationStatus,
        next: ConsultationStatus,
    ) -> Result<(), ConsultationError> {
        debug!("Validating status transition from {} to {}", current, next);

        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(ConsultationError::InvalidState(current));
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn valid_transitions(&self, current: ConsultationStatus) -> Vec<ConsultationStatus> {
        match current {
            ConsultationStatus::Scheduled => vec![
                ConsultationStatus::InProgress,
                ConsultationStatus::Cancelled,
            ],
            ConsultationStatus::InProgress => vec![ConsultationStatus::Completed],
            // Terminal states - no transitions allowed
            ConsultationStatus::Completed
            | ConsultationStatus::Cancelled
            | ConsultationStatus::Failed => vec![],
        }
    }

    /// A session may start only within the window around its scheduled time.
    pub fn validate_start_window(
        &self,
        scheduled_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ConsultationError> {
        let offset = now - scheduled_start;
        if offset.abs() > Duration::minutes(START_WINDOW_MINUTES) {
            return Err(ConsultationError::OutsideStartWindow);
        }
        Ok(())
    }
}

impl Default for ConsultationLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
