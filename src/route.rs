//! Route definitions for the booking API
//!
//! This module configures all HTTP routes and maps them to their respective handlers.
//! Everything lives under `/api`; routes that act on behalf of a user sit
//! behind the session middleware.

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::database::AppState;
use crate::handler::{
    add_favorite, cancel_booking, create_booking, get_booking, get_hotel, list_bookings,
    list_favorites, list_hotels, logout, me, pay_booking, rate_booking, remove_favorite,
    request_otp, room_availability, room_quote, update_booking_status, verify_otp,
};
use crate::middleware::session_middleware;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// Public:
/// - `POST /api/auth/otp` - Issue a one-time code
/// - `POST /api/auth/verify` - Exchange a code for a bearer token
/// - `GET /api/hotels` - List/search hotels
/// - `GET /api/hotels/{id}` - Hotel with rooms and reviews
/// - `GET /api/hotels/{id}/rooms/{room_id}/availability` - Availability for a stay
/// - `GET /api/hotels/{id}/rooms/{room_id}/quote` - Price breakdown for a stay
///
/// Requires `Authorization: Bearer <token>`:
/// - `POST /api/auth/logout`, `GET /api/me`
/// - `GET|POST /api/favorites`, `DELETE /api/favorites/{property_id}`
/// - `GET|POST /api/bookings`, `GET /api/bookings/{id}`
/// - `POST /api/bookings/{id}/pay|cancel|rate`, `PATCH /api/bookings/{id}/status`
///
/// # Example Usage
///
/// ```no_run
/// # use staybook::database::{init_db, AppState};
/// # use staybook::route::create_app;
/// # let db = init_db("staybook.db").unwrap();
/// let app = create_app(AppState::new(db));
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/otp", post(request_otp))
        .route("/auth/verify", post(verify_otp))
        .route("/hotels", get(list_hotels))
        .route("/hotels/{id}", get(get_hotel))
        .route(
            "/hotels/{id}/rooms/{room_id}/availability",
            get(room_availability),
        )
        .route("/hotels/{id}/rooms/{room_id}/quote", get(room_quote));

    let session_routes = Router::new()
        .route("/auth/logout", post(logout))
        .route("/me", get(me))
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/{property_id}", delete(remove_favorite))
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/pay", post(pay_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/bookings/{id}/rate", post(rate_booking))
        .route("/bookings/{id}/status", patch(update_booking_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .nest("/api", public_routes.merge(session_routes))
        .with_state(state)
}
