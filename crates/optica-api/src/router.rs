//! API router.
//!
//! Every route lives under `/api/`. Everything except the health check needs
//! an identified actor, resolved by [`middleware::actor::require_actor`].

use axum::routing::{get, post, put};
use axum::Router;

use optica_core::OpticaCore;

use crate::endpoints;
use crate::middleware;
use crate::state::AppState;

/// Build the API router over a core handle.
pub fn api_router(core: OpticaCore) -> Router {
    build_router(AppState::new(core))
}

fn build_router(state: AppState) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/patients", post(endpoints::patients::create))
        .route("/patients/search", get(endpoints::patients::search))
        .route("/patients/query", get(endpoints::patients::grid))
        .route(
            "/patients/:id",
            get(endpoints::patients::detail).put(endpoints::patients::update),
        )
        .route("/patients/:id/grid", get(endpoints::patients::grid_row))
        .route("/visits", post(endpoints::visits::create))
        .route("/visits/in-lab", get(endpoints::visits::in_lab))
        .route(
            "/visits/recent/:patient_id",
            get(endpoints::visits::recent),
        )
        .route("/visits/:id", get(endpoints::visits::detail))
        .route("/visits/:id/notes", put(endpoints::visits::update_notes))
        .route("/visits/:id/concepts", post(endpoints::visits::add_concept))
        .route("/visits/:id/status", post(endpoints::status::change))
        .route(
            "/visits/:id/status-history",
            get(endpoints::status::history),
        )
        .route("/visits/:id/status-chain", get(endpoints::status::verify))
        .route(
            "/visits/:id/payments",
            get(endpoints::payments::list).post(endpoints::payments::add),
        )
        .route("/dashboard/kpis", get(endpoints::dashboard::kpis))
        .route(
            "/dashboard/patient-attendance",
            get(endpoints::dashboard::patient_attendance),
        )
        .route(
            "/dashboard/payment-methods",
            get(endpoints::dashboard::payment_methods),
        )
        .route(
            "/dashboard/order-status",
            get(endpoints::dashboard::order_status),
        )
        .route(
            "/dashboard/sales-by-category",
            get(endpoints::dashboard::sales_by_category),
        )
        .route(
            "/dashboard/monthly-revenue",
            get(endpoints::dashboard::monthly_revenue),
        )
        .route(
            "/branches",
            get(endpoints::catalog::list_branches).post(endpoints::catalog::create_branch),
        )
        .route(
            "/materials",
            get(endpoints::catalog::list_materials).post(endpoints::catalog::create_material),
        )
        .route(
            "/products",
            get(endpoints::catalog::list_products).post(endpoints::catalog::create_product),
        )
        .route(
            "/products/:id",
            get(endpoints::catalog::get_product).delete(endpoints::catalog::deactivate_product),
        )
        .route(
            "/support",
            get(endpoints::support::list).post(endpoints::support::create),
        )
        .with_state(state.clone())
        .layer(axum::middleware::from_fn(middleware::actor::require_actor));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(state);

    Router::new().nest("/api", protected.merge(unprotected))
}
