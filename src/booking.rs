//! Booking writer: create, pay, cancel, status changes and rating
//!
//! Multi-step writes run inside a single redb write transaction. redb admits
//! one writer at a time, so the availability re-check and the insert in
//! [`create_booking`] cannot interleave with another booking for the same
//! room, and [`rate_booking`] updates the booking and the hotel aggregate
//! together or not at all.

use chrono::{DateTime, Duration, Utc};
use redb::{Database, ReadableTable};

use crate::availability::{find_conflict, find_room, DateRange};
use crate::database::{
    insert_booking, load, random_id, room_bookings, store, TABLE_BOOKINGS, TABLE_HOTELS,
    TABLE_ROOM_INDEX, TABLE_USERS,
};
use crate::error::{AppError, AppResult};
use crate::model::{
    Booking, BookingStatus, CreateBookingRequest, Hotel, PaymentMethod, PaymentRequest, Review,
    Session, User,
};
use crate::pricing::compute_price;

/// Length of generated booking ids
const BOOKING_ID_LEN: usize = 8;

/// Deployment-specific booking rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    /// How long after creation a booking may still be cancelled
    pub cancellation_window: Duration,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            cancellation_window: Duration::hours(12),
        }
    }
}

/// Pure time predicate: was the booking created within the window?
///
/// Says nothing about status; a cancelled or completed booking can still
/// pass it. Combine with [`is_cancellable`] before offering a cancel action.
pub fn can_cancel(booking: &Booking, now: DateTime<Utc>, window: Duration) -> bool {
    now - booking.created_at <= window
}

/// Time window AND a status that allows user cancellation
pub fn is_cancellable(booking: &Booking, now: DateTime<Utc>, window: Duration) -> bool {
    matches!(
        booking.status,
        BookingStatus::Pending | BookingStatus::Confirmed
    ) && can_cancel(booking, now, window)
}

fn owned_booking<R>(bookings: &R, session: &Session, id: &str) -> AppResult<Booking>
where
    R: ReadableTable<&'static str, &'static str>,
{
    let booking: Booking =
        load(bookings, id)?.ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;
    if booking.user_id != session.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(booking)
}

/// Creates a pending booking after re-validating availability
///
/// The availability scan and the insert share one write transaction.
///
/// # Errors
///
/// - [`AppError::InvalidRange`] for an empty, inverted or past range
/// - [`AppError::RoomNotFound`] when the hotel or room does not exist
/// - [`AppError::RoomUnavailable`] when the room's static flag is off
/// - [`AppError::Validation`] when the party exceeds the room's capacity
/// - [`AppError::Conflict`] with the blocking stay when the range overlaps an
///   active booking
pub fn create_booking(
    db: &Database,
    session: &Session,
    request: &CreateBookingRequest,
    now: DateTime<Utc>,
) -> AppResult<Booking> {
    let range = DateRange::upcoming(request.check_in, request.check_out, now.date_naive())?;
    let guests = request.guests.unwrap_or(1);
    if guests == 0 {
        return Err(AppError::Validation("at least one guest is required".to_string()));
    }

    let write_txn = db.begin_write()?;

    let booking = {
        let hotels = write_txn.open_table(TABLE_HOTELS)?;
        let hotel: Option<Hotel> = load(&hotels, &request.hotel_id)?;
        let room = find_room(hotel.as_ref(), &request.hotel_id, request.room_id)?;

        if !room.available {
            return Err(AppError::RoomUnavailable(room.id));
        }
        if guests > room.max_guests {
            return Err(AppError::Validation(format!(
                "room {} holds at most {} guests",
                room.id, room.max_guests
            )));
        }

        let index = write_txn.open_table(TABLE_ROOM_INDEX)?;
        let bookings = write_txn.open_table(TABLE_BOOKINGS)?;
        let existing = room_bookings(&index, &bookings, &request.hotel_id, request.room_id)?;

        if let Some(conflict) = find_conflict(&existing, &range) {
            tracing::warn!(
                hotel_id = %request.hotel_id,
                room_id = request.room_id,
                requested_check_in = %range.check_in,
                requested_check_out = %range.check_out,
                existing_check_in = %conflict.check_in,
                existing_check_out = %conflict.check_out,
                "booking rejected: dates overlap an existing stay"
            );
            return Err(AppError::Conflict {
                check_in: conflict.check_in,
                check_out: conflict.check_out,
            });
        }

        let mut id = random_id(BOOKING_ID_LEN);
        while bookings.get(id.as_str())?.is_some() {
            id = random_id(BOOKING_ID_LEN);
        }

        let price = compute_price(room.price, range.nights())?;

        Booking {
            id,
            user_id: session.user_id.clone(),
            hotel_id: request.hotel_id.clone(),
            room_id: request.room_id,
            check_in: range.check_in,
            check_out: range.check_out,
            guests,
            nights: price.nights,
            subtotal: price.subtotal,
            tax: price.tax,
            service_fee: price.service_fee,
            total: price.total,
            created_at: now,
            status: BookingStatus::Pending,
            payment_method: request.payment_method,
            rating: None,
            review: None,
        }
    };

    insert_booking(&write_txn, &booking)?;
    write_txn.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        user_id = %booking.user_id,
        hotel_id = %booking.hotel_id,
        room_id = booking.room_id,
        total = booking.total,
        "booking created"
    );

    Ok(booking)
}

/// Checks the payment details a simulated checkout would collect
pub fn validate_payment(payment: &PaymentRequest) -> AppResult<()> {
    fn invalid(msg: &str) -> AppError {
        AppError::Validation(msg.to_string())
    }

    match payment.method {
        PaymentMethod::Card => {
            let number: String = payment
                .card_number
                .as_deref()
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if !(12..=19).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("card number must be 12 to 19 digits"));
            }

            if payment.card_holder.as_deref().unwrap_or_default().trim().is_empty() {
                return Err(invalid("card holder is required"));
            }

            let expiry = payment.expiry.as_deref().unwrap_or_default();
            let month = expiry
                .split_once('/')
                .filter(|(mm, yy)| mm.len() == 2 && yy.len() == 2)
                .filter(|(_, yy)| yy.chars().all(|c| c.is_ascii_digit()))
                .and_then(|(mm, _)| mm.parse::<u32>().ok());
            if !matches!(month, Some(1..=12)) {
                return Err(invalid("expiry must be MM/YY"));
            }

            let cvv = payment.cvv.as_deref().unwrap_or_default();
            if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("cvv must be 3 or 4 digits"));
            }
        }
        PaymentMethod::Paypal => {
            let email = payment.email.as_deref().unwrap_or_default();
            match email.split_once('@') {
                Some((user, domain)) if !user.is_empty() && domain.contains('.') => {}
                _ => return Err(invalid("a valid PayPal email is required")),
            }
        }
        PaymentMethod::Bank => {}
    }
    Ok(())
}

/// Simulated payment: validates details and confirms a pending booking
pub fn pay_booking(
    db: &Database,
    session: &Session,
    id: &str,
    payment: &PaymentRequest,
) -> AppResult<Booking> {
    validate_payment(payment)?;

    let write_txn = db.begin_write()?;
    let booking = {
        let mut bookings = write_txn.open_table(TABLE_BOOKINGS)?;
        let mut booking = owned_booking(&bookings, session, id)?;

        if booking.status != BookingStatus::Pending {
            return Err(AppError::InvalidStatus {
                current: booking.status,
                action: "pay for",
            });
        }

        booking.payment_method = payment.method;
        booking.status = BookingStatus::Confirmed;
        store(&mut bookings, &booking.id, &booking)?;
        booking
    };
    write_txn.commit()?;

    tracing::info!(booking_id = %booking.id, method = ?booking.payment_method, "payment accepted");
    Ok(booking)
}

/// Cancels a pending or confirmed booking within the cancellation window
///
/// The record is kept with status cancelled; availability checks simply
/// stop counting it.
///
/// # Errors
///
/// - [`AppError::BookingNotFound`] / [`AppError::Forbidden`]
/// - [`AppError::InvalidStatus`] when the booking is not pending or confirmed
/// - [`AppError::CancellationWindowExpired`] past the window
pub fn cancel_booking(
    db: &Database,
    session: &Session,
    id: &str,
    now: DateTime<Utc>,
    policy: &BookingPolicy,
) -> AppResult<Booking> {
    let write_txn = db.begin_write()?;
    let booking = {
        let mut bookings = write_txn.open_table(TABLE_BOOKINGS)?;
        let mut booking = owned_booking(&bookings, session, id)?;

        if !matches!(
            booking.status,
            BookingStatus::Pending | BookingStatus::Confirmed
        ) {
            return Err(AppError::InvalidStatus {
                current: booking.status,
                action: "cancel",
            });
        }
        if !can_cancel(&booking, now, policy.cancellation_window) {
            tracing::warn!(booking_id = %booking.id, created_at = %booking.created_at, "cancellation window expired");
            return Err(AppError::CancellationWindowExpired);
        }

        booking.status = BookingStatus::Cancelled;
        store(&mut bookings, &booking.id, &booking)?;
        booking
    };
    write_txn.commit()?;

    tracing::info!(booking_id = %booking.id, "booking cancelled");
    Ok(booking)
}

/// Manual lifecycle step taken by the guest: check-in or completion
///
/// # Errors
///
/// - [`AppError::BookingNotFound`] / [`AppError::Forbidden`]
/// - [`AppError::InvalidStatus`] for a move the lifecycle does not allow;
///   a pending booking must be paid before anything else happens to it
/// - [`AppError::StayNotStarted`] when checking in or completing before the
///   check-in date
pub fn update_status(
    db: &Database,
    session: &Session,
    id: &str,
    next: BookingStatus,
    now: DateTime<Utc>,
) -> AppResult<Booking> {
    let write_txn = db.begin_write()?;
    let booking = {
        let mut bookings = write_txn.open_table(TABLE_BOOKINGS)?;
        let mut booking = owned_booking(&bookings, session, id)?;

        if !booking.status.can_transition_to(next) {
            return Err(AppError::InvalidStatus {
                current: booking.status,
                action: match next {
                    BookingStatus::Pending => "reopen",
                    BookingStatus::Confirmed => "confirm",
                    BookingStatus::CheckedIn => "check in",
                    BookingStatus::Completed => "complete",
                    BookingStatus::Cancelled => "cancel",
                },
            });
        }
        if now.date_naive() < booking.check_in {
            return Err(AppError::StayNotStarted(booking.check_in));
        }

        booking.status = next;
        store(&mut bookings, &booking.id, &booking)?;
        booking
    };
    write_txn.commit()?;

    tracing::info!(booking_id = %booking.id, status = %booking.status, "booking status changed");
    Ok(booking)
}

/// Mean of review ratings rounded to one decimal; zero without reviews
pub fn aggregate_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    let mean = f64::from(sum) / reviews.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Next sequential review id: `max + 1`, or 1 for the first review
pub fn next_review_id(reviews: &[Review]) -> u32 {
    reviews.iter().map(|r| r.id).max().map_or(1, |max| max + 1)
}

/// Rates a completed stay and folds the review into the hotel aggregate
///
/// The booking's rating fields and the hotel's review list, `rating` and
/// `reviews_count` are written in the same transaction.
///
/// # Errors
///
/// - [`AppError::Validation`] for a rating outside 1..=5 or empty review text
/// - [`AppError::InvalidStatus`] unless the booking is completed
/// - [`AppError::AlreadyRated`] when the booking already produced a review
pub fn rate_booking(
    db: &Database,
    session: &Session,
    id: &str,
    rating: i64,
    review: &str,
    now: DateTime<Utc>,
) -> AppResult<(Booking, Hotel)> {
    let rating = u8::try_from(rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::Validation("rating must be between 1 and 5".to_string()))?;
    let review = review.trim();
    if review.is_empty() {
        return Err(AppError::Validation("review text must not be empty".to_string()));
    }

    let write_txn = db.begin_write()?;
    let (booking, hotel) = {
        let mut bookings = write_txn.open_table(TABLE_BOOKINGS)?;
        let mut booking = owned_booking(&bookings, session, id)?;

        if booking.status != BookingStatus::Completed {
            return Err(AppError::InvalidStatus {
                current: booking.status,
                action: "rate",
            });
        }
        if booking.rating.is_some() {
            return Err(AppError::AlreadyRated);
        }

        let mut hotels = write_txn.open_table(TABLE_HOTELS)?;
        let mut hotel: Hotel = load(&hotels, &booking.hotel_id)?
            .ok_or_else(|| AppError::HotelNotFound(booking.hotel_id.clone()))?;

        if hotel
            .reviews
            .iter()
            .any(|r| r.booking_id.as_deref() == Some(booking.id.as_str()))
        {
            return Err(AppError::AlreadyRated);
        }

        let users = write_txn.open_table(TABLE_USERS)?;
        let author: Option<User> = load(&users, &session.user_id)?;

        hotel.reviews.push(Review {
            id: next_review_id(&hotel.reviews),
            author: author
                .as_ref()
                .and_then(|u| u.name.clone())
                .unwrap_or_else(|| "Guest".to_string()),
            avatar: author.and_then(|u| u.avatar),
            rating,
            text: review.to_string(),
            date: Some(now),
            booking_id: Some(booking.id.clone()),
        });
        hotel.rating = aggregate_rating(&hotel.reviews);
        hotel.reviews_count = u32::try_from(hotel.reviews.len()).unwrap_or(u32::MAX);

        booking.rating = Some(rating);
        booking.review = Some(review.to_string());

        store(&mut bookings, &booking.id, &booking)?;
        store(&mut hotels, &hotel.id, &hotel)?;
        (booking, hotel)
    };
    write_txn.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        hotel_id = %hotel.id,
        rating,
        hotel_rating = hotel.rating,
        reviews_count = hotel.reviews_count,
        "booking rated"
    );

    Ok((booking, hotel))
}
