// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::missing_errors_doc,      // Internal API
    clippy::missing_panics_doc,      // Internal API
    clippy::module_name_repetitions, // e.g. ConfigError in config module
    clippy::must_use_candidate,      // Annotated selectively on critical APIs
    clippy::doc_markdown             // Internal API
)]

pub mod app;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod environment;
pub mod filter;
pub mod metadata;

// Re-export main types for easy access
pub use app::App;
pub use config::{Config, ConfigError, ParseError};
pub use domain::Severity;
pub use filter::{PriorityFilter, compile_filter};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
