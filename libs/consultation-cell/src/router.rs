// libs/consultation-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;
use crate::models::ConsultationSettings;
use crate::services::locks::PractitionerLocks;
use crate::services::notify::{dispatcher_from_config, NotificationDispatcher};

/// Process-wide cell state. The lock map must outlive individual requests so
/// concurrent bookings for one practitioner serialize through the same mutex.
pub struct ConsultationCellState {
    pub config: Arc<AppConfig>,
    pub settings: ConsultationSettings,
    pub locks: Arc<PractitionerLocks>,
    pub notifier: Arc<dyn NotificationDispatcher>,
}

impl ConsultationCellState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let notifier = dispatcher_from_config(&config);
        Self {
            config,
            settings: ConsultationSettings::default(),
            locks: Arc::new(PractitionerLocks::new()),
            notifier,
        }
    }

    pub fn with_settings(config: Arc<AppConfig>, settings: ConsultationSettings) -> Self {
        let notifier = dispatcher_from_config(&config);
        Self {
            config,
            settings,
            locks: Arc::new(PractitionerLocks::new()),
            notifier,
        }
    }
}

pub fn consultation_routes(config: Arc<AppConfig>) -> Router {
    consultation_routes_with_state(Arc::new(ConsultationCellState::new(config)))
}

pub fn consultation_routes_with_state(state: Arc<ConsultationCellState>) -> Router {
    Router::new()
        .route("/", post(handlers::schedule_consultation))
        .route("/availability", get(handlers::get_availability))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .route("/{consultation_id}/start", post(handlers::start_consultation))
        .route(
            "/{consultation_id}/complete",
            post(handlers::complete_consultation),
        )
        .route(
            "/{consultation_id}/cancel",
            post(handlers::cancel_consultation),
        )
        .route(
            "/practitioners/{practitioner_id}",
            get(handlers::get_practitioner_day),
        )
        .with_state(state)
}
