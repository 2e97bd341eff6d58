//! Database initialization, table definitions and document helpers
//!
//! Every collection is a redb table mapping a string id to a JSON document.
//! Secondary index tables use composite string keys so that a prefix range
//! scan returns all entries of one owner in key order, the same way the
//! booking-by-room and booking-by-user lookups need them.

use std::sync::Arc;

use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::booking::BookingPolicy;
use crate::error::AppResult;
use crate::model::{Booking, Favorite, Hotel, Seed, User};

/// Hotels with their rooms and reviews embedded
///
/// Key: hotel id, Value: JSON-serialized [`Hotel`]
pub const TABLE_HOTELS: TableDefinition<&str, &str> = TableDefinition::new("hotels_v1");

/// Key: booking id, Value: JSON-serialized [`Booking`]
pub const TABLE_BOOKINGS: TableDefinition<&str, &str> = TableDefinition::new("bookings_v1");

/// Index of bookings per room
///
/// Key: `"{hotel_id}:{room_id}:{check_in}:{booking_id}"`, Value: booking id
///
/// ISO dates sort lexicographically, so a prefix scan yields the room's
/// bookings in check-in order.
pub const TABLE_ROOM_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("room_bookings_v1");

/// Index of bookings per user
///
/// Key: `"{user_id}:{booking_id}"`, Value: booking id
pub const TABLE_USER_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("user_bookings_v1");

/// Key: user id, Value: JSON-serialized [`User`]
pub const TABLE_USERS: TableDefinition<&str, &str> = TableDefinition::new("users_v1");

/// Key: phone number, Value: user id
pub const TABLE_PHONE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("user_phones_v1");

/// Key: `"{user_id}:{property_id}"`, Value: JSON-serialized [`Favorite`]
pub const TABLE_FAVORITES: TableDefinition<&str, &str> = TableDefinition::new("favorites_v1");

/// Key: phone number, Value: JSON-serialized [`crate::model::OtpRecord`]
pub const TABLE_OTPS: TableDefinition<&str, &str> = TableDefinition::new("otps_v1");

/// Key: session token, Value: user id
pub const TABLE_SESSIONS: TableDefinition<&str, &str> = TableDefinition::new("sessions_v1");

const ALL_TABLES: [TableDefinition<&str, &str>; 9] = [
    TABLE_HOTELS,
    TABLE_BOOKINGS,
    TABLE_ROOM_INDEX,
    TABLE_USER_INDEX,
    TABLE_USERS,
    TABLE_PHONE_INDEX,
    TABLE_FAVORITES,
    TABLE_OTPS,
    TABLE_SESSIONS,
];

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,

    /// Business rules that vary by deployment
    pub policy: BookingPolicy,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            policy: BookingPolicy::default(),
        }
    }

    pub fn with_policy(db: Database, policy: BookingPolicy) -> Self {
        Self {
            db: Arc::new(db),
            policy,
        }
    }
}

/// Creates or opens the database file and makes sure every table exists
///
/// # Example
///
/// ```no_run
/// # use staybook::database::init_db;
/// let db = init_db("staybook.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        for table in ALL_TABLES {
            write_txn.open_table(table)?;
        }
    }
    write_txn.commit()?;

    Ok(db)
}

/// Loads seed hotels and users, but only into an empty hotels table
///
/// Returns the number of hotels imported.
pub fn import_seed(db: &Database, seed: &Seed) -> AppResult<usize> {
    let write_txn = db.begin_write()?;
    let imported = {
        let mut hotels = write_txn.open_table(TABLE_HOTELS)?;
        if hotels.iter()?.next().is_some() {
            0
        } else {
            for hotel in &seed.hotels {
                store(&mut hotels, &hotel.id, hotel)?;
            }

            let mut users = write_txn.open_table(TABLE_USERS)?;
            let mut phones = write_txn.open_table(TABLE_PHONE_INDEX)?;
            for user in &seed.users {
                store(&mut users, &user.id, user)?;
                phones.insert(user.phone.as_str(), user.id.as_str())?;
            }

            seed.hotels.len()
        }
    };
    write_txn.commit()?;

    Ok(imported)
}

/// Random lowercase alphanumeric identifier
pub fn random_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

// ---------------------------------------------------------------------------
// Document helpers usable inside any transaction
// ---------------------------------------------------------------------------

/// Reads and deserializes one document
pub fn load<T, R>(table: &R, key: &str) -> AppResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static str>,
{
    match table.get(key)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

/// Serializes and writes one document, replacing any previous version
pub fn store<T: Serialize>(
    table: &mut redb::Table<'_, &'static str, &'static str>,
    key: &str,
    value: &T,
) -> AppResult<()> {
    let json = serde_json::to_string(value)?;
    table.insert(key, json.as_str())?;
    Ok(())
}

/// Values of every index entry whose key starts with `"{prefix}:"`
///
/// `'{'` sorts right after `':'`, so `"{prefix}:" .. "{prefix}:{"` covers
/// exactly the entries of one owner.
pub fn scan_prefix<R>(table: &R, prefix: &str) -> AppResult<Vec<String>>
where
    R: ReadableTable<&'static str, &'static str>,
{
    let start_key = format!("{}:", prefix);
    let end_key = format!("{}:{{", prefix);

    let mut values = Vec::new();
    for entry in table.range(start_key.as_str()..end_key.as_str())? {
        let (_, value) = entry?;
        values.push(value.value().to_string());
    }
    Ok(values)
}

pub fn room_prefix(hotel_id: &str, room_id: u32) -> String {
    format!("{}:{}", hotel_id, room_id)
}

pub fn room_index_key(booking: &Booking) -> String {
    format!(
        "{}:{}:{}",
        room_prefix(&booking.hotel_id, booking.room_id),
        booking.check_in,
        booking.id
    )
}

pub fn user_index_key(booking: &Booking) -> String {
    format!("{}:{}", booking.user_id, booking.id)
}

/// All bookings of one room in check-in order, regardless of status
///
/// Ids are free-form, so the prefix `"a:1:"` of hotel `a` room 1 also spans
/// hotel `a:1`; documents that belong elsewhere are dropped after loading.
pub fn room_bookings<I, B>(
    index: &I,
    bookings: &B,
    hotel_id: &str,
    room_id: u32,
) -> AppResult<Vec<Booking>>
where
    I: ReadableTable<&'static str, &'static str>,
    B: ReadableTable<&'static str, &'static str>,
{
    let ids = scan_prefix(index, &room_prefix(hotel_id, room_id))?;
    let mut result = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(booking) = load::<Booking, _>(bookings, &id)? {
            if booking.hotel_id == hotel_id && booking.room_id == room_id {
                result.push(booking);
            }
        }
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Hotel store
// ---------------------------------------------------------------------------

pub fn put_hotel(db: &Database, hotel: &Hotel) -> AppResult<()> {
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(TABLE_HOTELS)?;
        store(&mut table, &hotel.id, hotel)?;
    }
    write_txn.commit()?;
    Ok(())
}

pub fn get_hotel(db: &Database, id: &str) -> AppResult<Option<Hotel>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_HOTELS)?;
    load(&table, id)
}

/// Every hotel, ordered by id
pub fn list_hotels(db: &Database) -> AppResult<Vec<Hotel>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_HOTELS)?;

    let mut hotels = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        hotels.push(serde_json::from_str(value.value())?);
    }
    Ok(hotels)
}

// ---------------------------------------------------------------------------
// Booking store
// ---------------------------------------------------------------------------

/// Selects which bookings [`list_bookings`] returns
#[derive(Debug, Clone)]
pub enum BookingFilter {
    User(String),
    Room { hotel_id: String, room_id: u32 },
}

pub fn get_booking(db: &Database, id: &str) -> AppResult<Option<Booking>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_BOOKINGS)?;
    load(&table, id)
}

pub fn list_bookings(db: &Database, filter: &BookingFilter) -> AppResult<Vec<Booking>> {
    let read_txn = db.begin_read()?;
    let bookings = read_txn.open_table(TABLE_BOOKINGS)?;

    match filter {
        BookingFilter::User(user_id) => {
            let index = read_txn.open_table(TABLE_USER_INDEX)?;
            let mut result = Vec::new();
            for id in scan_prefix(&index, user_id)? {
                if let Some(booking) = load::<Booking, _>(&bookings, &id)? {
                    if &booking.user_id == user_id {
                        result.push(booking);
                    }
                }
            }
            Ok(result)
        }
        BookingFilter::Room { hotel_id, room_id } => {
            let index = read_txn.open_table(TABLE_ROOM_INDEX)?;
            room_bookings(&index, &bookings, hotel_id, *room_id)
        }
    }
}

/// Writes a new booking together with its index entries
pub fn insert_booking(write_txn: &redb::WriteTransaction, booking: &Booking) -> AppResult<()> {
    let mut bookings = write_txn.open_table(TABLE_BOOKINGS)?;
    store(&mut bookings, &booking.id, booking)?;

    let mut rooms = write_txn.open_table(TABLE_ROOM_INDEX)?;
    rooms.insert(room_index_key(booking).as_str(), booking.id.as_str())?;

    let mut users = write_txn.open_table(TABLE_USER_INDEX)?;
    users.insert(user_index_key(booking).as_str(), booking.id.as_str())?;

    Ok(())
}

// ---------------------------------------------------------------------------
// User store
// ---------------------------------------------------------------------------

pub fn get_user(db: &Database, id: &str) -> AppResult<Option<User>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_USERS)?;
    load(&table, id)
}

// ---------------------------------------------------------------------------
// Favorites store
// ---------------------------------------------------------------------------

fn favorite_key(user_id: &str, property_id: &str) -> String {
    format!("{}:{}", user_id, property_id)
}

pub fn list_favorites(db: &Database, user_id: &str) -> AppResult<Vec<Favorite>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_FAVORITES)?;

    let mut favorites = Vec::new();
    for json in scan_prefix(&table, user_id)? {
        let favorite: Favorite = serde_json::from_str(&json)?;
        if favorite.user_id == user_id {
            favorites.push(favorite);
        }
    }
    Ok(favorites)
}

/// Marks a property as liked; returns `false` when it already was
pub fn add_favorite(db: &Database, favorite: &Favorite) -> AppResult<bool> {
    let key = favorite_key(&favorite.user_id, &favorite.property_id);

    let write_txn = db.begin_write()?;
    let created = {
        let mut table = write_txn.open_table(TABLE_FAVORITES)?;
        let exists = table.get(key.as_str())?.is_some();
        if !exists {
            store(&mut table, &key, favorite)?;
        }
        !exists
    };
    write_txn.commit()?;

    Ok(created)
}

/// Returns whether a favorite was actually removed
pub fn remove_favorite(db: &Database, user_id: &str, property_id: &str) -> AppResult<bool> {
    let key = favorite_key(user_id, property_id);

    let write_txn = db.begin_write()?;
    let removed = {
        let mut table = write_txn.open_table(TABLE_FAVORITES)?;
        let removed = table.remove(key.as_str())?.is_some();
        removed
    };
    write_txn.commit()?;

    Ok(removed)
}
