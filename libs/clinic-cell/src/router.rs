// libs/clinic-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn clinic_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_clinics))
        .route("/{clinic_id}", get(handlers::get_clinic));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_clinic))
        .route("/{clinic_id}", put(handlers::update_clinic))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
