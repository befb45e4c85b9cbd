pub mod ai;
pub mod appointments;
pub mod auth;
pub mod config;
pub mod consult;
pub mod dashboard;
pub mod error;
pub mod imaging;
pub mod pharmacy;
pub mod prescriptions;
pub mod reports;
pub mod state;
pub mod store;
pub mod tts;
pub mod video;
pub mod voice;

// Re-export main types for convenience
pub use ai::GeminiClient;
pub use config::Config;
pub use consult::{ConsultationMode, Language};
pub use error::{DeskError, DeskResult};
pub use pharmacy::Cart;
pub use state::{ChatHistory, Exchange, Session};
pub use store::HealthDb;

/// Shown under every AI answer and at the bottom of every screen.
pub const DISCLAIMER: &str =
    "This AI provides general medical information only. It is NOT a substitute for professional medical advice.";
