pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

// Re-export the core surface for external use
pub use models::*;
pub use services::*;
