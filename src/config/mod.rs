pub mod env;
mod loader;
pub mod pacing;
pub mod run;

pub use env::{AppConfig, DirectoryConfig, ProviderConfig};
pub use loader::load_config;
pub use pacing::{DelayRange, PacingConfig, PixelRange};
pub use run::{validate_api_key, RunConfig, RunSettings};
