//! Phone/OTP login and bearer sessions
//!
//! A deliberately small collaborator: codes are echoed back to the caller
//! (there is no SMS gateway) and sessions never expire.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use redb::{Database, ReadableDatabase, ReadableTable};

use crate::database::{
    load, random_id, store, TABLE_OTPS, TABLE_PHONE_INDEX, TABLE_SESSIONS, TABLE_USERS,
};
use crate::error::{AppError, AppResult};
use crate::model::{OtpRecord, Session, User};

/// How long a one-time code stays valid
pub const OTP_TTL_MINUTES: i64 = 5;

const SESSION_TOKEN_LEN: usize = 32;
const USER_ID_LEN: usize = 10;

/// Normalizes a phone number: optional leading `+`, 8 to 15 digits,
/// spaces and dashes ignored
pub fn normalize_phone(phone: &str) -> AppResult<String> {
    let trimmed = phone.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };
    let digits: String = rest.chars().filter(|c| *c != ' ' && *c != '-').collect();

    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(format!("invalid phone number: {}", phone)));
    }
    Ok(format!("{}{}", plus, digits))
}

/// Issues a fresh 6-digit code for `phone`, replacing any outstanding one
pub fn request_otp(db: &Database, phone: &str, now: DateTime<Utc>) -> AppResult<String> {
    let phone = normalize_phone(phone)?;
    let code = format!("{:06}", rand::rng().random_range(0..1_000_000));

    let record = OtpRecord {
        code: code.clone(),
        expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
    };

    let write_txn = db.begin_write()?;
    {
        let mut otps = write_txn.open_table(TABLE_OTPS)?;
        store(&mut otps, &phone, &record)?;
    }
    write_txn.commit()?;

    tracing::info!(phone = %phone, "otp issued");
    Ok(code)
}

/// Consumes a matching, unexpired code and opens a session
///
/// The user is created on first login.
pub fn verify_otp(
    db: &Database,
    phone: &str,
    code: &str,
    now: DateTime<Utc>,
) -> AppResult<(Session, User)> {
    let phone = normalize_phone(phone)?;

    let write_txn = db.begin_write()?;
    let (session, user) = {
        let mut otps = write_txn.open_table(TABLE_OTPS)?;
        let record: Option<OtpRecord> = load(&otps, &phone)?;
        match record {
            Some(record) if record.code == code.trim() && now <= record.expires_at => {}
            _ => {
                tracing::warn!(phone = %phone, "otp rejected");
                return Err(AppError::InvalidOtp);
            }
        }
        otps.remove(phone.as_str())?;

        let mut phones = write_txn.open_table(TABLE_PHONE_INDEX)?;
        let mut users = write_txn.open_table(TABLE_USERS)?;

        let existing_id = phones.get(phone.as_str())?.map(|g| g.value().to_string());
        let existing: Option<User> = match &existing_id {
            Some(id) => load(&users, id)?,
            None => None,
        };

        let user = match existing {
            Some(user) => user,
            None => {
                let user = User {
                    id: random_id(USER_ID_LEN),
                    phone: phone.clone(),
                    name: None,
                    avatar: None,
                    created_at: now,
                };
                store(&mut users, &user.id, &user)?;
                phones.insert(phone.as_str(), user.id.as_str())?;
                tracing::info!(user_id = %user.id, "user registered");
                user
            }
        };

        let token = random_id(SESSION_TOKEN_LEN);
        let mut sessions = write_txn.open_table(TABLE_SESSIONS)?;
        sessions.insert(token.as_str(), user.id.as_str())?;

        (
            Session {
                token,
                user_id: user.id.clone(),
            },
            user,
        )
    };
    write_txn.commit()?;

    tracing::info!(user_id = %user.id, "session opened");
    Ok((session, user))
}

/// Resolves a bearer token to its session
pub fn resolve_session(db: &Database, token: &str) -> AppResult<Session> {
    let read_txn = db.begin_read()?;
    let sessions = read_txn.open_table(TABLE_SESSIONS)?;

    let user_id = sessions
        .get(token)?
        .map(|g| g.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    Ok(Session {
        token: token.to_string(),
        user_id,
    })
}

pub fn logout(db: &Database, session: &Session) -> AppResult<()> {
    let write_txn = db.begin_write()?;
    {
        let mut sessions = write_txn.open_table(TABLE_SESSIONS)?;
        sessions.remove(session.token.as_str())?;
    }
    write_txn.commit()?;

    tracing::info!(user_id = %session.user_id, "session closed");
    Ok(())
}
