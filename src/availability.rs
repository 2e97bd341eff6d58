//! Room availability over half-open date ranges
//!
//! A stay occupies `[check_in, check_out)`: the checkout day itself is free,
//! so a booking ending on the 15th and one starting on the 15th do not
//! conflict. Only bookings in an active status (pending, confirmed,
//! checked-in) occupy the room.

use chrono::NaiveDate;
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;

use crate::database::{load, room_bookings, TABLE_BOOKINGS, TABLE_HOTELS, TABLE_ROOM_INDEX};
use crate::error::{AppError, AppResult};
use crate::model::{Booking, Hotel, Room};

/// A validated `[check_in, check_out)` interval
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateRange {
    /// Fails with [`AppError::InvalidRange`] unless `check_in < check_out`
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> AppResult<Self> {
        if check_out <= check_in {
            return Err(AppError::InvalidRange(format!(
                "check-out {} must be after check-in {}",
                check_out, check_in
            )));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// Like [`DateRange::new`], and additionally rejects stays starting
    /// before `today`
    pub fn upcoming(check_in: NaiveDate, check_out: NaiveDate, today: NaiveDate) -> AppResult<Self> {
        let range = Self::new(check_in, check_out)?;
        if check_in < today {
            return Err(AppError::InvalidRange(format!(
                "check-in {} is in the past",
                check_in
            )));
        }
        Ok(range)
    }

    pub fn of(booking: &Booking) -> Self {
        Self {
            check_in: booking.check_in,
            check_out: booking.check_out,
        }
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn nights(&self) -> u32 {
        crate::pricing::nights_between(self.check_in, self.check_out)
    }
}

/// Result of an availability check
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,

    /// The existing stay that blocks the request, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<DateRange>,
}

/// First active booking overlapping `range`, in the order given
pub fn find_conflict<'a, I>(bookings: I, range: &DateRange) -> Option<DateRange>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings
        .into_iter()
        .filter(|booking| booking.status.is_active())
        .map(DateRange::of)
        .find(|existing| existing.overlaps(range))
}

/// Looks up a room, treating a missing hotel the same as a missing room
pub fn find_room<'h>(hotel: Option<&'h Hotel>, hotel_id: &str, room_id: u32) -> AppResult<&'h Room> {
    hotel
        .and_then(|hotel| hotel.room(room_id))
        .ok_or_else(|| AppError::RoomNotFound {
            hotel_id: hotel_id.to_string(),
            room_id,
        })
}

/// Availability of one room against the bookings already read for it
pub fn evaluate(room: &Room, bookings: &[Booking], range: &DateRange) -> Availability {
    if !room.available {
        return Availability {
            available: false,
            conflict: None,
        };
    }

    match find_conflict(bookings, range) {
        Some(conflict) => Availability {
            available: false,
            conflict: Some(conflict),
        },
        None => Availability {
            available: true,
            conflict: None,
        },
    }
}

/// Checks whether a room can be booked for `[check_in, check_out)`
///
/// Read-only: runs inside a single snapshot, so repeated calls on unchanged
/// data give the same answer.
///
/// # Errors
///
/// - [`AppError::InvalidRange`] when `check_out <= check_in` or the stay
///   starts before `today`
/// - [`AppError::RoomNotFound`] when the hotel or the room does not exist
pub fn check_availability(
    db: &Database,
    hotel_id: &str,
    room_id: u32,
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> AppResult<Availability> {
    let range = DateRange::upcoming(check_in, check_out, today)?;

    let read_txn = db.begin_read()?;
    let hotels = read_txn.open_table(TABLE_HOTELS)?;
    let hotel: Option<Hotel> = load(&hotels, hotel_id)?;
    let room = find_room(hotel.as_ref(), hotel_id, room_id)?;

    let index = read_txn.open_table(TABLE_ROOM_INDEX)?;
    let bookings = read_txn.open_table(TABLE_BOOKINGS)?;
    let existing = room_bookings(&index, &bookings, hotel_id, room_id)?;

    let availability = evaluate(room, &existing, &range);
    tracing::debug!(
        hotel_id,
        room_id,
        %check_in,
        %check_out,
        available = availability.available,
        "availability checked"
    );

    Ok(availability)
}

/// Whether any room of `hotel` fits `guests` and, when given, is free for
/// `range`; used by hotel search
pub fn hotel_has_room<T>(
    hotel: &Hotel,
    guests: u32,
    range: Option<&DateRange>,
    index: &T,
    bookings: &T,
) -> AppResult<bool>
where
    T: ReadableTable<&'static str, &'static str>,
{
    for room in hotel
        .rooms
        .iter()
        .filter(|room| room.available && room.max_guests >= guests)
    {
        let Some(range) = range else {
            return Ok(true);
        };
        let existing = room_bookings(index, bookings, &hotel.id, room.id)?;
        if find_conflict(&existing, range).is_none() {
            return Ok(true);
        }
    }
    Ok(false)
}
