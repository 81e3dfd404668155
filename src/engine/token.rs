//! Continuation-token codec
//!
//! Tokens are self-describing: a versioned bincode blob carrying the mode,
//! the upstream cursor, a fingerprint of the originating query, and an issue
//! timestamp, prefixed with a truncated BLAKE3 checksum and hex-encoded.
//! Validity is checkable without any server-side session state, so tokens
//! survive process restarts.

use super::error::QueryError;
use super::types::{ActivityQuery, QueryMode};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TOKEN_VERSION: u8 = 1;
const CHECKSUM_LEN: usize = 8;

/// Exact resumption point within a paginated upstream result stream.
///
/// `page_token` addresses the page (None for the first page); `skip` counts
/// records of that page already delivered to the caller. Re-fetching the page
/// and dropping the first `skip` records resumes with no duplicates on a
/// stable upstream dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePosition {
    pub page_token: Option<String>,
    pub skip: u32,
}

impl PagePosition {
    pub fn start() -> Self {
        Self {
            page_token: None,
            skip: 0,
        }
    }
}

/// Mode-specific cursor carried inside a continuation token.
///
/// Owned by the executor that issued it; the router only round-trips it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorState {
    Recent {
        position: PagePosition,
    },
    Historical {
        query_id: String,
        position: PagePosition,
    },
}

/// Decoded continuation token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationToken {
    version: u8,
    pub cursor: CursorState,
    pub fingerprint: u64,
    /// Unix seconds at issue time
    pub issued_at: i64,
}

impl ContinuationToken {
    pub fn new(cursor: CursorState, fingerprint: u64) -> Self {
        Self {
            version: TOKEN_VERSION,
            cursor,
            fingerprint,
            issued_at: Utc::now().timestamp(),
        }
    }

    /// Mode recorded in the token; pagination never switches execution paths
    pub fn mode(&self) -> QueryMode {
        match self.cursor {
            CursorState::Recent { .. } => QueryMode::Recent,
            CursorState::Historical { .. } => QueryMode::Historical,
        }
    }

    /// Encode as an opaque hex string: checksum || bincode payload
    pub fn encode(&self) -> String {
        let payload = bincode::serialize(self).expect("token serialization is infallible");
        let digest = blake3::hash(&payload);
        let mut blob = Vec::with_capacity(CHECKSUM_LEN + payload.len());
        blob.extend_from_slice(&digest.as_bytes()[..CHECKSUM_LEN]);
        blob.extend_from_slice(&payload);
        hex::encode(blob)
    }

    /// Decode and integrity-check an opaque token string
    pub fn decode(encoded: &str) -> Result<Self, QueryError> {
        let blob = hex::decode(encoded)
            .map_err(|_| QueryError::InvalidToken("not a valid token encoding".to_string()))?;

        if blob.len() <= CHECKSUM_LEN {
            return Err(QueryError::InvalidToken("token too short".to_string()));
        }

        let (checksum, payload) = blob.split_at(CHECKSUM_LEN);
        let digest = blake3::hash(payload);
        if checksum != &digest.as_bytes()[..CHECKSUM_LEN] {
            return Err(QueryError::InvalidToken("checksum mismatch".to_string()));
        }

        let token: ContinuationToken = bincode::deserialize(payload)
            .map_err(|_| QueryError::InvalidToken("malformed token payload".to_string()))?;

        if token.version != TOKEN_VERSION {
            return Err(QueryError::InvalidToken(format!(
                "unsupported token version {}",
                token.version
            )));
        }

        Ok(token)
    }

    /// Check the token against the current query's fingerprint and age limit
    pub fn validate(&self, expected_fingerprint: u64, ttl: Duration) -> Result<(), QueryError> {
        if self.fingerprint != expected_fingerprint {
            return Err(QueryError::InvalidToken(
                "token was issued for a different query".to_string(),
            ));
        }

        let age = Utc::now().timestamp().saturating_sub(self.issued_at);
        if age < 0 || age as u64 > ttl.as_secs() {
            return Err(QueryError::InvalidToken("token has expired".to_string()));
        }

        Ok(())
    }
}

/// Fingerprint of the normalized query shape.
///
/// Covers the time range and every filter; excludes `max_results` and the
/// token itself, so a caller may change page size mid-pagination.
pub fn query_fingerprint(query: &ActivityQuery) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&query.start_time.timestamp_millis().to_le_bytes());
    hasher.update(&query.end_time.timestamp_millis().to_le_bytes());
    for field in [
        &query.event_name,
        &query.actor,
        &query.resource,
        &query.free_text,
    ] {
        match field {
            Some(v) => {
                hasher.update(&[1u8]);
                hasher.update(&(v.len() as u64).to_le_bytes());
                hasher.update(v.as_bytes());
            }
            None => {
                hasher.update(&[0u8]);
            }
        }
    }
    let digest = hasher.finalize();
    u64::from_le_bytes(digest.as_bytes()[..8].try_into().expect("digest >= 8 bytes"))
}
