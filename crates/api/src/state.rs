use std::sync::Arc;

use rulegate_pipeline::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Runs validations and exposes the stores and registry behind them.
    pub orchestrator: Arc<Orchestrator>,
}
