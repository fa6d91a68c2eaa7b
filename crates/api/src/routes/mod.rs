pub mod health;
pub mod validations;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /validations/execute                              run a validation (POST)
/// /validations/rule-types                           registered rule types (GET)
/// /validations/configs                              list configs (?context)
/// /validations/configs/{context}/{target_type}      get, upsert (GET, PUT)
/// /validations/reference-data/{source}              upsert reference data (PUT)
/// /validations/results                              list results (?filter)
/// /validations/results/csv                          export results as CSV (GET)
/// /validations/results/{id}                         get one result (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/validations", validations::router())
}
