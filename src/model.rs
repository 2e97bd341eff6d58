//! Data models for the booking service
//!
//! This module defines the documents persisted in the store (hotels, rooms,
//! reviews, bookings, users, favorites) and the request/response payloads
//! exchanged over HTTP. Documents are tolerant of missing optional fields:
//! anything absent deserializes to its default.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Whole currency units
pub type Money = u64;

/// A room or hotel feature
///
/// Stored documents mix plain strings (`"Wifi"`) with described objects
/// (`{"icon": "Wifi", "label": "Free Wi-Fi", "description": "..."}`); both
/// shapes deserialize into this enum.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Amenity {
    Label(String),
    Described {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}


/// A bookable room, owned by exactly one hotel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Unique within the owning hotel
    pub id: u32,

    #[serde(default)]
    pub name: String,

    /// Nightly rate
    pub price: Money,

    #[serde(default = "default_max_guests")]
    pub max_guests: u32,

    /// Static flag set by the hotel; not derived from bookings
    #[serde(default = "default_true")]
    pub available: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beds: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    #[serde(default)]
    pub amenities: Vec<Amenity>,
}

fn default_max_guests() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// A guest review, created as a side effect of rating a completed booking
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Sequential within the hotel
    pub id: u32,

    #[serde(default)]
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    pub rating: u8,

    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,

    /// Booking that produced this review; prevents duplicates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub facilities: Vec<Amenity>,

    #[serde(default)]
    pub rooms: Vec<Room>,

    #[serde(default)]
    pub reviews: Vec<Review>,

    /// Mean of review ratings, one decimal
    #[serde(default)]
    pub rating: f64,

    #[serde(default)]
    pub reviews_count: u32,
}

impl Hotel {
    pub fn room(&self, room_id: u32) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == room_id)
    }
}

/// Booking lifecycle states
///
/// Stored in kebab-case (`"checked-in"`); the capitalized spellings written
/// by older clients (`"Pending"`, `"Cancelled"`) are accepted on read.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    #[serde(alias = "Pending")]
    Pending,
    #[serde(alias = "Confirmed")]
    Confirmed,
    #[serde(alias = "Checked-in", alias = "CheckedIn")]
    CheckedIn,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Cancelled")]
    Cancelled,
}

impl BookingStatus {
    /// Statuses that occupy room capacity
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::CheckedIn)
    }

    /// Manual lifecycle transitions
    ///
    /// Confirmation happens only through payment and cancellation has its
    /// own path, so neither is reachable from here.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Confirmed, CheckedIn)
                | (Confirmed, Completed)
                | (CheckedIn, Completed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked-in",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "checked-in" | "checkedin" => Ok(Self::CheckedIn),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Paypal,
    Bank,
}

/// The central booking document
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub hotel_id: String,
    pub room_id: u32,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,

    #[serde(default = "default_guests")]
    pub guests: u32,

    #[serde(default = "default_nights")]
    pub nights: u32,

    #[serde(default)]
    pub subtotal: Money,

    #[serde(default)]
    pub tax: Money,

    #[serde(default)]
    pub service_fee: Money,

    #[serde(default)]
    pub total: Money,

    pub created_at: DateTime<Utc>,

    pub status: BookingStatus,

    pub payment_method: PaymentMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
}

fn default_guests() -> u32 {
    1
}

fn default_nights() -> u32 {
    1
}

impl Booking {
    /// Human-facing reference code, e.g. `BKX7K2M9QA`
    pub fn reference(&self) -> String {
        format!("BK{}", self.id.to_uppercase())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub phone: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// A (user, property) pair; existence means "liked"
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub user_id: String,
    pub property_id: String,
}

/// Identity of the caller, resolved from the bearer token by the session
/// middleware and passed explicitly to every protected operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

/// Pending one-time password for a phone number
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OtpRecord {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Seed document in the json-server `db.json` layout
#[derive(Deserialize, Debug, Default)]
pub struct Seed {
    #[serde(default)]
    pub hotels: Vec<Hotel>,

    #[serde(default)]
    pub users: Vec<User>,
}

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

/// Query string for availability and quote lookups
///
/// `?check_in=2024-05-10&check_out=2024-05-15`
#[derive(Deserialize, Debug, Clone)]
pub struct StayParams {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

/// Query string for hotel search
#[derive(Deserialize, Debug, Clone, Default)]
pub struct HotelSearch {
    pub location: Option<String>,
    pub guests: Option<u32>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
}

/// Request payload for creating a booking
///
/// ```json
/// {
///   "hotel_id": "h1",
///   "room_id": 101,
///   "check_in": "2024-05-10",
///   "check_out": "2024-05-15",
///   "guests": 2,
///   "payment_method": "card"
/// }
/// ```
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CreateBookingRequest {
    pub hotel_id: String,
    pub room_id: u32,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: Option<u32>,
    pub payment_method: PaymentMethod,
}

/// Simulated payment details; which fields are required depends on the method
#[derive(Deserialize, Debug, Clone)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub card_number: Option<String>,
    pub card_holder: Option<String>,
    pub expiry: Option<String>,
    pub cvv: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RateRequest {
    /// Read wide so an out-of-range number reaches validation instead of
    /// failing in the JSON extractor
    pub rating: i64,
    pub review: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StatusUpdateRequest {
    pub status: BookingStatus,
}

/// Query string for "My Bookings"
///
/// `?status=confirmed&q=sunrise`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct BookingListParams {
    pub status: Option<String>,
    pub q: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FavoriteRequest {
    pub property_id: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OtpRequest {
    pub phone: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct VerifyRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct OtpResponse {
    pub success: bool,
    /// Echoed back because there is no SMS gateway behind this service
    pub otp: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct VerifyResponse {
    pub success: bool,
    pub token: String,
    pub user: User,
}
