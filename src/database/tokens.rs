use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::Store;
use crate::error::{Result, StoreError};
use crate::model::RefreshToken;

/// Refresh tokens of the shared document
///
/// A user holds at most one token: storing a new one revokes the previous one
/// inside the same critical section.
#[derive(Clone)]
pub struct TokenRepository {
    store: Arc<Store>,
}

impl TokenRepository {
    pub(super) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Revokes any token already held by the same user, then stores `token`
    /// keyed by its value.
    pub fn store(&self, token: RefreshToken) -> Result<()> {
        self.store.update(|doc| {
            doc.refresh_tokens
                .retain(|_, existing| existing.user_id != token.user_id);
            doc.refresh_tokens.insert(token.token.clone(), token);
            Ok(())
        })
    }

    /// Deletes a token. Revoking an unknown token is not an error.
    pub fn revoke(&self, token: &str) -> Result<()> {
        self.store.update(|doc| {
            doc.refresh_tokens.remove(token);
            Ok(())
        })
    }

    /// Returns the token if it exists and has not expired.
    ///
    /// This is a side-effecting read: an expired token is deleted before
    /// [`StoreError::Expired`] is returned, so the next lookup of the same
    /// value fails with `NotFound`.
    pub fn get_valid(&self, token: &str) -> Result<RefreshToken> {
        self.get_valid_at(token, Utc::now())
    }

    /// [`get_valid`](Self::get_valid) evaluated at an explicit instant.
    pub fn get_valid_at(&self, token: &str, now: DateTime<Utc>) -> Result<RefreshToken> {
        let found = self.store.read(|doc| {
            doc.refresh_tokens
                .get(token)
                .cloned()
                .ok_or(StoreError::NotFound("refresh token"))
        })?;

        if !found.is_expired_at(now) {
            return Ok(found);
        }

        // Re-check under the exclusive lock: the token may have been revoked
        // or replaced since the shared read.
        self.store.update(|doc| {
            if doc
                .refresh_tokens
                .get(token)
                .is_some_and(|current| current.is_expired_at(now))
            {
                doc.refresh_tokens.remove(token);
            }
            Ok(())
        })?;

        Err(StoreError::Expired)
    }
}
