// libs/consultation-cell/src/services/availability.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailabilitySlot, Consultation, ConsultationError, ConsultationSettings,
};

/// Bookable day grid: fixed 30-minute slots from 09:00 to 17:00.
pub const SLOT_MINUTES: i64 = 30;
pub const DAY_START_HOUR: u32 = 9;
pub const DAY_END_HOUR: u32 = 17;

/// Two intervals conflict when, each expanded by the buffer on both sides,
/// they strictly overlap. Back-to-back bookings exactly `2 * buffer` apart
/// only touch and are allowed.
pub fn buffered_overlap(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
    buffer_minutes: i32,
) -> bool {
    let buffer = Duration::minutes(buffer_minutes as i64);
    (start_a - buffer) < (end_b + buffer) && (start_b - buffer) < (end_a + buffer)
}

/// Pure slot-grid construction from a day's active consultations. Recomputed
/// on every call; the stored bookings are the only input.
pub fn build_day_slots(
    practitioner_id: Uuid,
    date: NaiveDate,
    existing: &[Consultation],
    buffer_minutes: i32,
) -> Vec<AvailabilitySlot> {
    let slot_count = ((DAY_END_HOUR - DAY_START_HOUR) as i64 * 60) / SLOT_MINUTES;
    let mut slots = Vec::with_capacity(slot_count as usize);

    for index in 0..slot_count {
        let minutes_from_open = index * SLOT_MINUTES;
        let start_time = NaiveTime::from_hms_opt(DAY_START_HOUR, 0, 0)
            .map(|open| open + Duration::minutes(minutes_from_open));
        let Some(start_time) = start_time else {
            continue;
        };

        let slot_start = date.and_time(start_time).and_utc();
        let slot_end = slot_start + Duration::minutes(SLOT_MINUTES);

        let available = !existing.iter().any(|consultation| {
            consultation.is_active()
                && buffered_overlap(
                    slot_start,
                    slot_end,
                    consultation.scheduled_start_time,
                    consultation.scheduled_end_time,
                    buffer_minutes,
                )
        });

        slots.push(AvailabilitySlot {
            practitioner_id,
            date,
            start_time,
            available,
        });
    }

    slots
}

pub struct SlotAvailabilityService {
    supabase: Arc<SupabaseClient>,
    settings: ConsultationSettings,
}

impl SlotAvailabilityService {
    pub fn new(supabase: Arc<SupabaseClient>, settings: ConsultationSettings) -> Self {
        Self { supabase, settings }
    }

    /// Compute the practitioner's slot grid for one calendar day.
    pub async fn day_slots(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<AvailabilitySlot>, ConsultationError> {
        debug!(
            "Computing availability for practitioner {} on {}",
            practitioner_id, date
        );

        let existing = self
            .consultations_for_day(practitioner_id, date, auth_token)
            .await?;

        Ok(build_day_slots(
            practitioner_id,
            date,
            &existing,
            self.settings.buffer_minutes,
        ))
    }

    /// All consultations touching the given day for a practitioner, ordered
    /// by start time. The window is widened by the buffer so bookings whose
    /// buffer spills across midnight still show up.
    pub async fn consultations_for_day(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        let slack = Duration::minutes(self.settings.buffer_minutes as i64);
        let day_start = date.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let day_end = date.and_hms_opt(23, 59, 59).map(|t| t.and_utc());
        let (Some(day_start), Some(day_end)) = (day_start, day_end) else {
            return Err(ConsultationError::Validation(format!(
                "Invalid calendar day: {}",
                date
            )));
        };

        let from = (day_start - slack).to_rfc3339();
        let to = (day_end + slack).to_rfc3339();

        let path = format!(
            "/rest/v1/consultations?practitioner_id=eq.{}&scheduled_end_time=gte.{}&scheduled_start_time=lte.{}&order=scheduled_start_time.asc",
            practitioner_id,
            urlencoding::encode(&from),
            urlencoding::encode(&to),
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::Dependency(e.to_string()))?;

        let consultations: Vec<Consultation> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Consultation>, _>>()
            .map_err(|e| {
                ConsultationError::Dependency(format!("Failed to parse consultations: {}", e))
            })?;

        Ok(consultations)
    }
}
