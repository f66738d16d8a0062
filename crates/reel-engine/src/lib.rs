pub mod adapters;
pub mod controller;
pub mod emitter;
pub mod error;
pub mod metrics;
pub mod mock;
pub mod quartiles;
pub mod relay;
pub mod selector;
pub mod sequencer;
pub mod signal;
pub mod timers;

pub use controller::{AdsManager, Collaborators, SessionAttributes, SessionState};
pub use error::SetupError;
pub use signal::MediaEventSender;
