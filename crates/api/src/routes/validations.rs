//! Route definitions for the `/validations` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::validations;
use crate::state::AppState;

/// Routes mounted at `/validations`.
///
/// ```text
/// POST   /execute                            -> execute
/// GET    /rule-types                         -> list_rule_types
/// GET    /configs                            -> list_configs       (?context)
/// GET    /configs/{context}/{target_type}    -> get_config
/// PUT    /configs/{context}/{target_type}    -> put_config
/// PUT    /reference-data/{source}            -> put_reference_data
/// GET    /results                            -> list_results       (?filter)
/// GET    /results/csv                        -> export_results_csv (?filter, delimiter, detailed)
/// GET    /results/{id}                       -> get_result
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/execute", post(validations::execute))
        .route("/rule-types", get(validations::list_rule_types))
        .route("/configs", get(validations::list_configs))
        .route(
            "/configs/{context}/{target_type}",
            get(validations::get_config).put(validations::put_config),
        )
        .route(
            "/reference-data/{source}",
            put(validations::put_reference_data),
        )
        .route("/results", get(validations::list_results))
        .route("/results/csv", get(validations::export_results_csv))
        .route("/results/{id}", get(validations::get_result))
}
