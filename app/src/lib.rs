pub mod availability;
pub mod backend;
pub mod config;
pub mod draft;
pub mod gallery;
pub mod nearby;
pub mod state;
pub mod telemetry;
pub mod time;
pub mod upload;

pub use backend::HostBackend;
pub use config::{Config, ConfigError};
pub use draft::{CarDraft, SaveError, ValidationError};
pub use gallery::GalleryError;
pub use state::State;
pub use time::TimeSource;
