use crate::config::Config;
use crate::extraction::service::AtsExtractor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// The extraction service. Holds the generative backend behind a trait
    /// object so tests can substitute a scripted backend.
    pub extractor: AtsExtractor,
}
