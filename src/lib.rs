//! Interaction layer for the chest X-ray report page.
//!
//! [`Workspace`] drives the page: file selection, analysis, the typed-out
//! report, follow-up questions and the report history. Front ends render the
//! [`PageView`] it produces.

pub mod api;
pub mod chat;
pub mod config;
pub mod findings;
pub mod history;
pub mod render;
pub mod reveal;
pub mod state;
pub mod upload;
pub mod workspace;


pub use api::{ApiClient, ApiError, ReportBackend};
pub use config::Config;
pub use findings::{Confidence, Finding, Findings};
pub use render::PageView;
pub use state::Tab;
pub use upload::SelectedFile;
pub use workspace::Workspace;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
