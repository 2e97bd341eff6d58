//! HTTP request handlers for the booking API
//!
//! Handlers are thin: they extract the session and payload, call into the
//! service modules with the current time, and let [`AppError`] render any
//! failure. Every service call is synchronous against the embedded store.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;

use crate::auth;
use crate::availability::check_availability;
use crate::booking;
use crate::catalog;
use crate::database::{self, AppState};
use crate::error::{AppError, AppResult};
use crate::model::{
    BookingListParams, CreateBookingRequest, Favorite, FavoriteRequest, HotelSearch, OtpRequest,
    OtpResponse, PaymentRequest, RateRequest, Session, StatusUpdateRequest, StayParams,
    VerifyRequest, VerifyResponse,
};
use crate::projection::{self, StatusFilter};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Issues a one-time code for a phone number
///
/// # Request Body
///
/// ```json
/// { "phone": "0905123456" }
/// ```
///
/// # Response
///
/// - **200 OK** - `{"success": true, "otp": "123456"}`
/// - **422 Unprocessable Entity** - malformed phone number
pub async fn request_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> AppResult<Json<OtpResponse>> {
    let otp = auth::request_otp(&state.db, &payload.phone, Utc::now())?;
    Ok(Json(OtpResponse { success: true, otp }))
}

/// Verifies a code and returns a bearer token plus the (possibly new) user
///
/// # Response
///
/// - **200 OK** - `{"success": true, "token": "...", "user": {...}}`
/// - **401 Unauthorized** - wrong or expired code
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> AppResult<Json<VerifyResponse>> {
    let (session, user) = auth::verify_otp(&state.db, &payload.phone, &payload.otp, Utc::now())?;
    Ok(Json(VerifyResponse {
        success: true,
        token: session.token,
        user,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> AppResult<StatusCode> {
    auth::logout(&state.db, &session)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Profile of the signed-in user
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> AppResult<impl IntoResponse> {
    let user = database::get_user(&state.db, &session.user_id)?
        .ok_or_else(|| AppError::UserNotFound(session.user_id.clone()))?;
    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Lists hotels, optionally filtered
///
/// # Example Request
///
/// `GET /api/hotels?location=da%20nang&guests=2&check_in=2024-05-10&check_out=2024-05-12`
pub async fn list_hotels(
    State(state): State<AppState>,
    Query(params): Query<HotelSearch>,
) -> AppResult<impl IntoResponse> {
    let hotels = catalog::search_hotels(&state.db, &params, Utc::now().date_naive())?;
    Ok(Json(hotels))
}

pub async fn get_hotel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(catalog::get_hotel(&state.db, &id)?))
}

/// Availability of one room for a stay
///
/// # Example Request
///
/// `GET /api/hotels/h1/rooms/1/availability?check_in=2024-05-15&check_out=2024-05-18`
///
/// # Response
///
/// ```json
/// { "available": false, "conflict": { "check_in": "2024-05-10", "check_out": "2024-05-16" } }
/// ```
pub async fn room_availability(
    State(state): State<AppState>,
    Path((hotel_id, room_id)): Path<(String, u32)>,
    Query(params): Query<StayParams>,
) -> AppResult<impl IntoResponse> {
    let availability = check_availability(
        &state.db,
        &hotel_id,
        room_id,
        params.check_in,
        params.check_out,
        Utc::now().date_naive(),
    )?;
    Ok(Json(availability))
}

/// Itemized price of a stay: subtotal, 10% tax, 5% service fee, total
pub async fn room_quote(
    State(state): State<AppState>,
    Path((hotel_id, room_id)): Path<(String, u32)>,
    Query(params): Query<StayParams>,
) -> AppResult<impl IntoResponse> {
    let price = catalog::quote(
        &state.db,
        &hotel_id,
        room_id,
        params.check_in,
        params.check_out,
    )?;
    Ok(Json(price))
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(database::list_favorites(&state.db, &session.user_id)?))
}

/// Likes a hotel
///
/// # Response
///
/// - **201 Created** - newly liked
/// - **200 OK** - already liked
/// - **404 Not Found** - unknown hotel
pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<FavoriteRequest>,
) -> AppResult<impl IntoResponse> {
    catalog::get_hotel(&state.db, &payload.property_id)?;

    let favorite = Favorite {
        user_id: session.user_id,
        property_id: payload.property_id,
    };
    let created = database::add_favorite(&state.db, &favorite)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(favorite)))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(property_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let removed = database::remove_favorite(&state.db, &session.user_id, &property_id)?;
    Ok(Json(json!({
        "property_id": property_id,
        "removed": removed
    })))
}

// ---------------------------------------------------------------------------
// Bookings
// ---------------------------------------------------------------------------

/// Books a room for the signed-in user
///
/// # Request Body
///
/// ```json
/// {
///   "hotel_id": "h1",
///   "room_id": 1,
///   "check_in": "2024-05-10",
///   "check_out": "2024-05-13",
///   "guests": 2,
///   "payment_method": "card"
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - the pending booking with its price breakdown
/// - **400 Bad Request** - invalid date range
/// - **404 Not Found** - unknown hotel or room
/// - **409 Conflict** - dates overlap an active booking (body carries the
///   conflicting interval) or the room is closed
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let booking = booking::create_booking(&state.db, &session, &payload, Utc::now())?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// "My Bookings"
///
/// # Query Parameters
///
/// - `status` (optional) - `all` (default), `pending`, `confirmed`,
///   `checked-in`, `completed` or `cancelled`
/// - `q` (optional) - case-insensitive search on reference code or hotel name
///
/// Results are ordered by check-in date, most recent first.
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(params): Query<BookingListParams>,
) -> AppResult<impl IntoResponse> {
    let status: StatusFilter = params.status.as_deref().unwrap_or("all").parse()?;
    let rows = projection::list_bookings(
        &state.db,
        &session.user_id,
        status,
        params.q.as_deref(),
        Utc::now(),
        state.policy.cancellation_window,
    )?;
    Ok(Json(rows))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let row = projection::get_booking(
        &state.db,
        &session,
        &id,
        Utc::now(),
        state.policy.cancellation_window,
    )?;
    Ok(Json(row))
}

/// Simulated checkout; confirms a pending booking
pub async fn pay_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<PaymentRequest>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(booking::pay_booking(&state.db, &session, &id, &payload)?))
}

/// Cancels a booking within the cancellation window
///
/// # Response
///
/// - **200 OK** - the cancelled booking
/// - **409 Conflict** - window expired or booking not pending/confirmed
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let booking = booking::cancel_booking(&state.db, &session, &id, Utc::now(), &state.policy)?;
    Ok(Json(booking))
}

/// Rates a completed stay
///
/// # Request Body
///
/// ```json
/// { "rating": 5, "review": "Lovely view" }
/// ```
pub async fn rate_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<RateRequest>,
) -> AppResult<impl IntoResponse> {
    let (booking, hotel) = booking::rate_booking(
        &state.db,
        &session,
        &id,
        payload.rating,
        &payload.review,
        Utc::now(),
    )?;
    Ok(Json(json!({
        "booking": booking,
        "hotel_rating": hotel.rating,
        "reviews_count": hotel.reviews_count
    })))
}

/// Checks in or completes one of the caller's bookings
///
/// # Request Body
///
/// ```json
/// { "status": "checked-in" }
/// ```
///
/// # Response
///
/// - **200 OK** - the updated booking
/// - **403 Forbidden** - booking belongs to another user
/// - **409 Conflict** - move not allowed from the current status, or the
///   stay has not started yet
pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> AppResult<impl IntoResponse> {
    let booking = booking::update_status(&state.db, &session, &id, payload.status, Utc::now())?;
    Ok(Json(booking))
}
