//! Integration tests for the booking API
//!
//! These tests drive the full router against a temporary database:
//! - HTTP routing and session middleware
//! - Availability, pricing and booking lifecycle
//! - Projection ("My Bookings") filters and ordering
//! - Error bodies

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Days, Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use staybook::database::{init_db, insert_booking, put_hotel, AppState};
use staybook::model::{Booking, BookingStatus, Hotel, PaymentMethod};
use staybook::route::create_app;

/// Creates a test application with a temporary database and two hotels
fn setup_test_app() -> (Router, NamedTempFile) {
    let (app, _state, temp_db) = setup_test_state();
    (app, temp_db)
}

/// Like [`setup_test_app`], also handing back the state for direct seeding
fn setup_test_state() -> (Router, AppState, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");

    let hotels: Vec<Hotel> = serde_json::from_value(json!([
        {
            "id": "h1",
            "title": "Sunrise Resort",
            "location": "Da Nang",
            "image": "/sunrise.jpg",
            "facilities": [{"icon": "Wifi", "label": "Free Wi-Fi", "description": "Everywhere"}],
            "rooms": [
                {"id": 1, "name": "Deluxe Ocean", "price": 100, "maxGuests": 2, "amenities": ["Tv", "Wifi"]},
                {"id": 2, "name": "Family Suite", "price": 250, "maxGuests": 5}
            ],
            "reviews": [{"id": 1, "author": "An", "rating": 4, "text": "Nice"}],
            "rating": 4.0,
            "reviewsCount": 1
        },
        {
            "id": "h2",
            "title": "Harbor Inn",
            "location": "Hoi An",
            "rooms": [{"id": 1, "name": "Twin", "price": 60, "maxGuests": 2}]
        }
    ]))
    .unwrap();
    for hotel in &hotels {
        put_hotel(&db, hotel).unwrap();
    }

    let state = AppState::new(db);
    (create_app(state.clone()), state, temp_db)
}

/// Date `n` days from today as `YYYY-MM-DD`
fn day(n: u64) -> String {
    (Utc::now().date_naive() + Days::new(n)).to_string()
}

async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Logs in through the OTP flow and returns the bearer token
async fn login(app: &Router, phone: &str) -> String {
    login_user(app, phone).await.0
}

/// Logs in and returns `(token, user_id)`
async fn login_user(app: &Router, phone: &str) -> (String, String) {
    let (status, body) = send(app, "POST", "/api/auth/otp", None, Some(json!({ "phone": phone }))).await;
    assert_eq!(status, StatusCode::OK);
    let otp = body["otp"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        "POST",
        "/api/auth/verify",
        None,
        Some(json!({ "phone": phone, "otp": otp })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

/// Stores a paid stay of room 1 that checked in three days ago
fn seed_past_stay(state: &AppState, id: &str, user_id: &str) {
    let today = Utc::now().date_naive();
    let booking = Booking {
        id: id.to_string(),
        user_id: user_id.to_string(),
        hotel_id: "h1".to_string(),
        room_id: 1,
        check_in: today - Days::new(3),
        check_out: today - Days::new(1),
        guests: 2,
        nights: 2,
        subtotal: 200,
        tax: 20,
        service_fee: 10,
        total: 230,
        created_at: Utc::now() - Duration::days(10),
        status: BookingStatus::Confirmed,
        payment_method: PaymentMethod::Card,
        rating: None,
        review: None,
    };

    let write_txn = state.db.begin_write().unwrap();
    insert_booking(&write_txn, &booking).unwrap();
    write_txn.commit().unwrap();
}

async fn book(app: &Router, token: &str, room_id: u32, check_in: &str, check_out: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/bookings",
        Some(token),
        Some(json!({
            "hotel_id": "h1",
            "room_id": room_id,
            "check_in": check_in,
            "check_out": check_out,
            "guests": 2,
            "payment_method": "card"
        })),
    )
    .await
}

#[tokio::test]
async fn test_list_and_get_hotels() {
    let (app, _temp_db) = setup_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/hotels")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, hotel) = send(&app, "GET", "/api/hotels/h1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hotel["title"], "Sunrise Resort");
    assert_eq!(hotel["facilities"][0]["label"], "Free Wi-Fi");
    assert_eq!(hotel["rooms"][0]["amenities"][0], "Tv");

    let (status, body) = send(&app, "GET", "/api/hotels/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "hotel_not_found");
}

#[tokio::test]
async fn test_search_hotels_by_location_and_guests() {
    let (app, _temp_db) = setup_test_app();

    let (_, body) = send(&app, "GET", "/api/hotels?location=hoi", None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "h2");

    let (_, body) = send(&app, "GET", "/api/hotels?guests=4", None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "h1");
}

#[tokio::test]
async fn test_quote_breakdown() {
    let (app, _temp_db) = setup_test_app();

    let uri = format!("/api/hotels/h1/rooms/1/quote?check_in={}&check_out={}", day(10), day(13));
    let (status, body) = send(&app, "GET", &uri, None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nights"], 3);
    assert_eq!(body["subtotal"], 300);
    assert_eq!(body["tax"], 30);
    assert_eq!(body["service_fee"], 15);
    assert_eq!(body["total"], 345);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let (app, _temp_db) = setup_test_app();

    let (status, body) = send(&app, "GET", "/api/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = send(&app, "GET", "/api/bookings", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_booking_and_conflict() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;

    let (status, booking) = book(&app, &token, 1, &day(10), &day(15)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["nights"], 5);
    assert_eq!(booking["total"], 575);

    // Overlapping request is rejected with the blocking interval
    let (status, body) = book(&app, &token, 1, &day(12), &day(20)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "booking_conflict");
    assert_eq!(body["conflict"]["check_in"], day(10));
    assert_eq!(body["conflict"]["check_out"], day(15));

    // Touching the checkout day is fine
    let (status, _) = book(&app, &token, 1, &day(15), &day(18)).await;
    assert_eq!(status, StatusCode::CREATED);

    // Another room of the same hotel is independent
    let (status, _) = book(&app, &token, 2, &day(12), &day(14)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_availability_endpoint() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;
    book(&app, &token, 1, &day(10), &day(15)).await;

    let uri = format!("/api/hotels/h1/rooms/1/availability?check_in={}&check_out={}", day(15), day(18));
    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "available": true }));

    let uri = format!("/api/hotels/h1/rooms/1/availability?check_in={}&check_out={}", day(12), day(20));
    let (_, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(body["available"], false);
    assert_eq!(body["conflict"]["check_in"], day(10));

    let uri = format!("/api/hotels/h1/rooms/9/availability?check_in={}&check_out={}", day(12), day(20));
    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "room_not_found");

    let uri = format!("/api/hotels/h1/rooms/1/availability?check_in={}&check_out={}", day(12), day(12));
    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_range");
}

#[tokio::test]
async fn test_booking_guest_limit() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(json!({
            "hotel_id": "h1",
            "room_id": 1,
            "check_in": day(3),
            "check_out": day(4),
            "guests": 3,
            "payment_method": "bank"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_pay_and_cancel_flow() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;
    let (_, booking) = book(&app, &token, 1, &day(10), &day(12)).await;
    let id = booking["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/bookings/{}/pay", id),
        Some(&token),
        Some(json!({ "method": "card", "card_number": "4111111111111111", "card_holder": "A", "expiry": "01/30", "cvv": "12" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/bookings/{}/pay", id),
        Some(&token),
        Some(json!({ "method": "paypal", "email": "guest@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["paymentMethod"], "paypal");

    let (status, body) = send(&app, "POST", &format!("/api/bookings/{}/cancel", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    // Cancelled dates no longer block the room
    let (status, _) = book(&app, &token, 1, &day(10), &day(12)).await;
    assert_eq!(status, StatusCode::CREATED);

    // A cancelled booking cannot be cancelled again
    let (status, body) = send(&app, "POST", &format!("/api/bookings/{}/cancel", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_status");
}

#[tokio::test]
async fn test_other_users_cannot_touch_booking() {
    let (app, _temp_db) = setup_test_app();
    let owner = login(&app, "0905123456").await;
    let stranger = login(&app, "0905999999").await;
    let (_, booking) = book(&app, &owner, 1, &day(10), &day(12)).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = send(&app, "GET", &format!("/api/bookings/{}", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", &format!("/api/bookings/{}/cancel", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, list) = send(&app, "GET", "/api/bookings", Some(&stranger), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_completed_booking_once() {
    let (app, state, _temp_db) = setup_test_state();
    let (token, user_id) = login_user(&app, "0905123456").await;
    seed_past_stay(&state, "past0001", &user_id);
    let rate = json!({ "rating": 5, "review": "Wonderful stay" });

    // Not completed yet
    let (status, body) = send(&app, "POST", "/api/bookings/past0001/rate", Some(&token), Some(rate.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_status");

    for next in ["checked-in", "completed"] {
        let (status, body) = send(
            &app,
            "PATCH",
            "/api/bookings/past0001/status",
            Some(&token),
            Some(json!({ "status": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], next);
    }

    let (status, body) = send(&app, "POST", "/api/bookings/past0001/rate", Some(&token), Some(rate.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reviews_count"], 2);
    assert_eq!(body["hotel_rating"], 4.5);
    assert_eq!(body["booking"]["rating"], 5);

    let (status, body) = send(&app, "POST", "/api/bookings/past0001/rate", Some(&token), Some(rate)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_rated");

    let (_, hotel) = send(&app, "GET", "/api/hotels/h1", None, None).await;
    assert_eq!(hotel["reviewsCount"], 2);
    assert_eq!(hotel["reviews"][1]["id"], 2);
    assert_eq!(hotel["reviews"][1]["bookingId"], "past0001");
}

#[tokio::test]
async fn test_status_change_by_another_user_is_forbidden() {
    let (app, _temp_db) = setup_test_app();
    let owner = login(&app, "0905123456").await;
    let stranger = login(&app, "0905999999").await;
    let (_, booking) = book(&app, &owner, 1, &day(10), &day(12)).await;
    let id = booking["id"].as_str().unwrap();
    let uri = format!("/api/bookings/{}/status", id);

    for next in ["confirmed", "completed"] {
        let (status, body) = send(&app, "PATCH", &uri, Some(&stranger), Some(json!({ "status": next }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");
    }

    // The owner's dates are still held
    let (status, _) = book(&app, &stranger, 1, &day(10), &day(12)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, row) = send(&app, "GET", &format!("/api/bookings/{}", id), Some(&owner), None).await;
    assert_eq!(row["status"], "pending");
}

#[tokio::test]
async fn test_status_change_needs_payment_and_started_stay() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;
    let (_, booking) = book(&app, &token, 1, &day(10), &day(12)).await;
    let id = booking["id"].as_str().unwrap();
    let uri = format!("/api/bookings/{}/status", id);

    // Confirmation only comes from paying
    let (status, body) = send(&app, "PATCH", &uri, Some(&token), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_status");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/bookings/{}/pay", id),
        Some(&token),
        Some(json!({ "method": "bank" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Completing an upcoming stay would free its dates
    let (status, body) = send(&app, "PATCH", &uri, Some(&token), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "stay_not_started");

    let (status, _) = book(&app, &token, 1, &day(10), &day(12)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_out_of_range_rating_gets_json_error() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings/whatever/rate",
        Some(&token),
        Some(json!({ "rating": 300, "review": "Great" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
    assert_eq!(body["error"], "rating must be between 1 and 5");
}

#[tokio::test]
async fn test_rate_rejects_empty_review() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings/whatever/rate",
        Some(&token),
        Some(json!({ "rating": 4, "review": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "review text must not be empty");
}

#[tokio::test]
async fn test_my_bookings_projection() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;

    let (_, early) = book(&app, &token, 1, &day(5), &day(7)).await;
    let (_, late) = book(&app, &token, 2, &day(30), &day(33)).await;
    send(&app, "POST", &format!("/api/bookings/{}/cancel", early["id"].as_str().unwrap()), Some(&token), None).await;

    let (status, list) = send(&app, "GET", "/api/bookings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = list.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    // Most recent trip first
    assert_eq!(rows[0]["id"], late["id"]);
    assert_eq!(rows[0]["propertyName"], "Sunrise Resort");
    assert_eq!(rows[0]["roomType"], "Family Suite");
    assert_eq!(rows[0]["pricePerNight"], 250);
    assert_eq!(rows[0]["guestPhone"], "0905123456");
    assert_eq!(rows[0]["cancellable"], true);
    assert_eq!(rows[1]["status"], "cancelled");
    assert_eq!(rows[1]["canCancel"], true);
    assert_eq!(rows[1]["cancellable"], false);

    let (_, list) = send(&app, "GET", "/api/bookings?status=cancelled", Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], early["id"]);

    let reference = rows[0]["bookingId"].as_str().unwrap().to_lowercase();
    let (_, list) = send(&app, "GET", &format!("/api/bookings?q={}", reference), Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, list) = send(&app, "GET", "/api/bookings?q=SUNRISE", Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/api/bookings?status=sleeping", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");

    // Identical filters on unchanged data give identical output
    let (_, first) = send(&app, "GET", "/api/bookings?status=all", Some(&token), None).await;
    let (_, second) = send(&app, "GET", "/api/bookings?status=all", Some(&token), None).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_favorites() {
    let (app, _temp_db) = setup_test_app();
    let token = login(&app, "0905123456").await;

    let (status, _) = send(&app, "POST", "/api/favorites", Some(&token), Some(json!({ "property_id": "h2" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "POST", "/api/favorites", Some(&token), Some(json!({ "property_id": "h2" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/api/favorites", Some(&token), Some(json!({ "property_id": "h404" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, "GET", "/api/favorites", Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["propertyId"], "h2");

    let (_, body) = send(&app, "DELETE", "/api/favorites/h2", Some(&token), None).await;
    assert_eq!(body["removed"], true);

    let (_, list) = send(&app, "GET", "/api/favorites", Some(&token), None).await;
    assert!(list.as_array().unwrap().is_empty());
}
