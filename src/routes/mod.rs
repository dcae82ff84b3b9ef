use axum::{
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::handlers::{auth, booking, driver, payment, rides};
use crate::middleware::auth::{auth_middleware, require_driver, require_rider};
use crate::socket::handler::ws_handler;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    // Rider routes
    let ride_routes = Router::new()
        .route("/request", post(rides::request_ride))
        .route("/my", get(rides::my_rides))
        .layer(middleware::from_fn(require_rider))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Booking lifecycle: driver transitions, rider cancel, shared fetch
    let booking_routes = Router::new()
        .route("/{id}/accept", patch(booking::accept))
        .route("/{id}/verify-otp", patch(booking::verify_otp))
        .route("/{id}/complete", patch(booking::complete))
        .route("/driver/dashboard", get(driver::dashboard))
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .merge(
            Router::new()
                .route("/{id}/cancel", patch(booking::cancel))
                .layer(middleware::from_fn(require_rider))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            Router::new()
                .route("/{id}", get(booking::get_booking))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    // Driver self-service
    let driver_routes = Router::new()
        .route("/location", patch(driver::update_location))
        .route("/status", patch(driver::toggle_status))
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Payment collaborator pass-through
    let payment_routes = Router::new()
        .route("/order", post(payment::create_order))
        .route("/verify", post(payment::verify_payment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/rides", ride_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/driver", driver_routes)
        .nest("/api/payments", payment_routes)
        .route("/api/drivers/available", get(driver::available_drivers))
        .route("/api/health", get(health))
        .route("/ws", get(ws_handler))
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Endpoint not found" })),
    )
}
