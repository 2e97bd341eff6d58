//! "My Bookings" projection
//!
//! Joins raw bookings with their hotel, room and guest into display rows.
//! Missing references degrade to placeholders instead of failing the list.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use redb::Database;
use serde::Serialize;

use crate::booking::{can_cancel, is_cancellable};
use crate::database::{self, BookingFilter};
use crate::error::{AppError, AppResult};
use crate::model::{Booking, BookingStatus, Hotel, Money, PaymentMethod, Session, User};

pub const UNKNOWN_HOTEL: &str = "Unknown Hotel";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";
pub const DEFAULT_ROOM_TYPE: &str = "Standard Room";

/// Status filter of the bookings list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(BookingStatus),
}

impl StatusFilter {
    pub fn matches(self, status: BookingStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only).map_err(AppError::Validation)
    }
}

/// Display-ready booking row
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayBooking {
    pub id: String,
    /// Reference code shown to the guest, e.g. `BKX7K2M9QA`
    pub booking_id: String,
    pub hotel_id: String,
    pub room_id: u32,
    pub property_name: String,
    pub location: String,
    pub address: String,
    pub image: String,
    pub room_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub price_per_night: Money,
    pub subtotal: Money,
    pub tax: Money,
    pub service_fee: Money,
    pub total_price: Money,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub guest_name: String,
    pub guest_phone: String,
    pub created_at: DateTime<Utc>,
    /// Created within the cancellation window; ignores status
    pub can_cancel: bool,
    /// Window AND a status the guest may cancel from
    pub cancellable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
}

/// Builds one display row from a booking and whatever could be joined
pub fn project(
    booking: &Booking,
    hotel: Option<&Hotel>,
    guest: Option<&User>,
    now: DateTime<Utc>,
    window: Duration,
) -> DisplayBooking {
    let room = hotel.and_then(|h| h.room(booking.room_id));
    let nights = booking.nights.max(1);
    let location = hotel
        .map(|h| h.location.clone())
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

    DisplayBooking {
        id: booking.id.clone(),
        booking_id: booking.reference(),
        hotel_id: booking.hotel_id.clone(),
        room_id: booking.room_id,
        property_name: hotel
            .map(|h| h.title.clone())
            .unwrap_or_else(|| UNKNOWN_HOTEL.to_string()),
        address: location.clone(),
        location,
        image: room
            .and_then(|r| r.image.clone())
            .or_else(|| hotel.and_then(|h| h.image.clone()))
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        room_type: room
            .map(|r| r.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM_TYPE.to_string()),
        check_in: booking.check_in,
        check_out: booking.check_out,
        nights,
        price_per_night: room
            .map(|r| r.price)
            .unwrap_or(booking.total / Money::from(nights)),
        subtotal: booking.subtotal,
        tax: booking.tax,
        service_fee: booking.service_fee,
        total_price: booking.total,
        status: booking.status,
        payment_method: booking.payment_method,
        guest_name: guest
            .and_then(|u| u.name.clone())
            .unwrap_or_else(|| "Guest".to_string()),
        guest_phone: guest
            .map(|u| u.phone.clone())
            .unwrap_or_else(|| "N/A".to_string()),
        created_at: booking.created_at,
        can_cancel: can_cancel(booking, now, window),
        cancellable: is_cancellable(booking, now, window),
        rating: booking.rating,
        review: booking.review.clone(),
    }
}

/// Case-insensitive match on reference code or hotel name
fn matches_search(row: &DisplayBooking, needle: &str) -> bool {
    row.booking_id.to_lowercase().contains(needle)
        || row.property_name.to_lowercase().contains(needle)
}

/// Orders rows most recent trip first; ties broken by id
pub fn sort_rows(rows: &mut [DisplayBooking]) {
    rows.sort_by(|a, b| b.check_in.cmp(&a.check_in).then_with(|| a.id.cmp(&b.id)));
}

/// The "My Bookings" list of one user
pub fn list_bookings(
    db: &Database,
    user_id: &str,
    status: StatusFilter,
    search: Option<&str>,
    now: DateTime<Utc>,
    window: Duration,
) -> AppResult<Vec<DisplayBooking>> {
    let bookings = database::list_bookings(db, &BookingFilter::User(user_id.to_string()))?;
    let guest = database::get_user(db, user_id)?;

    let mut hotels: HashMap<String, Option<Hotel>> = HashMap::new();
    for booking in &bookings {
        if !hotels.contains_key(&booking.hotel_id) {
            let hotel = database::get_hotel(db, &booking.hotel_id)?;
            hotels.insert(booking.hotel_id.clone(), hotel);
        }
    }

    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut rows: Vec<DisplayBooking> = bookings
        .iter()
        .filter(|booking| status.matches(booking.status))
        .map(|booking| {
            let hotel = hotels.get(&booking.hotel_id).and_then(Option::as_ref);
            project(booking, hotel, guest.as_ref(), now, window)
        })
        .filter(|row| needle.as_deref().map_or(true, |n| matches_search(row, n)))
        .collect();

    sort_rows(&mut rows);

    tracing::debug!(user_id, count = rows.len(), "bookings listed");
    Ok(rows)
}

/// One booking of the session's user as a display row
pub fn get_booking(
    db: &Database,
    session: &Session,
    id: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> AppResult<DisplayBooking> {
    let booking = database::get_booking(db, id)?
        .ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;
    if booking.user_id != session.user_id {
        return Err(AppError::Forbidden);
    }

    let hotel = database::get_hotel(db, &booking.hotel_id)?;
    let guest = database::get_user(db, &booking.user_id)?;
    Ok(project(&booking, hotel.as_ref(), guest.as_ref(), now, window))
}
