//! Studio configuration
//!
//! Configuration is stored as YAML. Every section and field has a default,
//! so a partial file only overrides what it names and a missing or broken
//! file yields the default configuration.
//!
//! # Usage
//!
//! ```ignore
//! use flamingo_core::config::{default_config_path, load_config, StudioConfig};
//!
//! let config: StudioConfig = load_config(&default_config_path());
//! ```

mod io;
mod paths;
mod studio;

pub use io::{load_config, parse_config, save_config};
pub use paths::{default_config_dir, default_config_path, CONFIG_FILE_NAME};
pub use studio::{AnalysisConfig, RemixConfig, ReverbConfig, StudioConfig};
