//! Error taxonomy for the booking service
//!
//! Every fallible operation returns [`AppError`]. The HTTP layer renders it
//! as a JSON body of the form `{"error": "...", "code": "..."}` with a status
//! code chosen per variant, so handlers can simply propagate with `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

use crate::model::BookingStatus;

/// Convenient result alias used across the crate
pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or past date range
    #[error("invalid date range: {0}")]
    InvalidRange(String),

    /// Malformed payment details, empty review text, bad phone number, ...
    #[error("{0}")]
    Validation(String),

    #[error("hotel not found: {0}")]
    HotelNotFound(String),

    #[error("room {room_id} not found in hotel {hotel_id}")]
    RoomNotFound { hotel_id: String, room_id: u32 },

    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    /// The requested range overlaps an existing active booking
    #[error("room is already booked from {check_in} to {check_out}")]
    Conflict {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    /// The room's static availability flag is off
    #[error("room {0} is not available for booking")]
    RoomUnavailable(u32),

    #[error("cancellation window expired")]
    CancellationWindowExpired,

    #[error("cannot {action} a booking with status {current}")]
    InvalidStatus {
        current: BookingStatus,
        action: &'static str,
    },

    #[error("booking already rated")]
    AlreadyRated,

    /// Check-in and completion wait for the first night of the stay
    #[error("stay has not started yet, check-in is {0}")]
    StayNotStarted(NaiveDate),

    #[error("invalid or expired OTP")]
    InvalidOtp,

    #[error("missing or invalid session")]
    Unauthorized,

    #[error("booking belongs to another user")]
    Forbidden,

    /// The document store could not be reached or failed mid-transaction
    #[error("store error: {0}")]
    Storage(#[from] redb::Error),

    #[error("corrupt document: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Stable machine-readable code included in every error body
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRange(_) => "invalid_range",
            Self::Validation(_) => "validation_error",
            Self::HotelNotFound(_) => "hotel_not_found",
            Self::RoomNotFound { .. } => "room_not_found",
            Self::BookingNotFound(_) => "booking_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::Conflict { .. } => "booking_conflict",
            Self::RoomUnavailable(_) => "room_unavailable",
            Self::CancellationWindowExpired => "cancellation_window_expired",
            Self::InvalidStatus { .. } => "invalid_status",
            Self::AlreadyRated => "already_rated",
            Self::StayNotStarted(_) => "stay_not_started",
            Self::InvalidOtp => "invalid_otp",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Storage(_) => "store_unavailable",
            Self::Serialization(_) => "corrupt_document",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::HotelNotFound(_)
            | Self::RoomNotFound { .. }
            | Self::BookingNotFound(_)
            | Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. }
            | Self::RoomUnavailable(_)
            | Self::CancellationWindowExpired
            | Self::InvalidStatus { .. }
            | Self::AlreadyRated
            | Self::StayNotStarted(_) => StatusCode::CONFLICT,
            Self::InvalidOtp | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// redb splits its failures into per-stage error types; funnel them all into
// the umbrella `redb::Error` so `?` works on every store call.
macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AppError {
                fn from(e: $ty) -> Self {
                    Self::Storage(e.into())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match status {
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "request failed");
            }
            _ => tracing::debug!(error = %self, code = self.code(), "request rejected"),
        }

        let body = match &self {
            Self::Conflict {
                check_in,
                check_out,
            } => json!({
                "error": self.to_string(),
                "code": self.code(),
                "conflict": {
                    "check_in": check_in,
                    "check_out": check_out,
                }
            }),
            _ => json!({
                "error": self.to_string(),
                "code": self.code(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
