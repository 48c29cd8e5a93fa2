pub mod availability;
pub mod lifecycle;
pub mod locks;
pub mod notify;
pub mod scheduler;

pub use availability::SlotAvailabilityService;
pub use lifecycle::ConsultationLifecycleService;
pub use locks::PractitionerLocks;
pub use notify::{dispatcher_from_config, LogNotifier, NotificationDispatcher, WebhookNotifier};
pub use scheduler::ConsultationScheduler;
