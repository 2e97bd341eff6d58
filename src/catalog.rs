//! Hotel catalog: lookup, search and price quotes

use chrono::NaiveDate;
use redb::{Database, ReadableDatabase, ReadableTable};

use crate::availability::{find_room, hotel_has_room, DateRange};
use crate::database::{self, TABLE_BOOKINGS, TABLE_HOTELS, TABLE_ROOM_INDEX};
use crate::error::{AppError, AppResult};
use crate::model::{Hotel, HotelSearch};
use crate::pricing::{compute_price, PriceBreakdown};

pub fn get_hotel(db: &Database, id: &str) -> AppResult<Hotel> {
    database::get_hotel(db, id)?.ok_or_else(|| AppError::HotelNotFound(id.to_string()))
}

/// Hotels matching every filter that is set
///
/// - `location`: case-insensitive substring of the hotel location
/// - `guests`: some statically available room holds the party
/// - `check_in` + `check_out`: that room is also free for the stay
///
/// Giving only one of the two dates is an [`AppError::InvalidRange`].
pub fn search_hotels(db: &Database, search: &HotelSearch, today: NaiveDate) -> AppResult<Vec<Hotel>> {
    let range = match (search.check_in, search.check_out) {
        (Some(check_in), Some(check_out)) => Some(DateRange::upcoming(check_in, check_out, today)?),
        (None, None) => None,
        _ => {
            return Err(AppError::InvalidRange(
                "check_in and check_out must be given together".to_string(),
            ))
        }
    };
    let location = search
        .location
        .as_deref()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty());
    let guests = search.guests.unwrap_or(0);

    let read_txn = db.begin_read()?;
    let hotels = read_txn.open_table(TABLE_HOTELS)?;
    let index = read_txn.open_table(TABLE_ROOM_INDEX)?;
    let bookings = read_txn.open_table(TABLE_BOOKINGS)?;

    let mut result = Vec::new();
    for entry in hotels.iter()? {
        let (_, value) = entry?;
        let hotel: Hotel = serde_json::from_str(value.value())?;

        if let Some(location) = &location {
            if !hotel.location.to_lowercase().contains(location) {
                continue;
            }
        }
        if (guests > 0 || range.is_some())
            && !hotel_has_room(&hotel, guests, range.as_ref(), &index, &bookings)?
        {
            continue;
        }
        result.push(hotel);
    }

    tracing::debug!(
        location = ?location,
        guests,
        dated = range.is_some(),
        count = result.len(),
        "hotel search"
    );
    Ok(result)
}

/// Price of a stay in one room, without checking availability
pub fn quote(
    db: &Database,
    hotel_id: &str,
    room_id: u32,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> AppResult<PriceBreakdown> {
    let range = DateRange::new(check_in, check_out)?;
    let hotel = database::get_hotel(db, hotel_id)?;
    let room = find_room(hotel.as_ref(), hotel_id, room_id)?;

    compute_price(room.price, range.nights())
}
