use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use super::Store;
use crate::error::{Result, StoreError};
use crate::model::User;

/// User records of the shared document
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<Store>,
}

impl UserRepository {
    pub(super) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Registers a user under a fresh UUID.
    ///
    /// Fails with [`StoreError::Conflict`] when the email (exact,
    /// case-sensitive match) is already taken.
    pub fn create(&self, email: &str, password_hash: &str) -> Result<User> {
        self.store.update(|doc| {
            if find_by_email(&doc.users, email).is_some() {
                return Err(StoreError::Conflict);
            }

            let user = User {
                id: Uuid::new_v4().to_string(),
                email: email.to_owned(),
                password_hash: password_hash.to_owned(),
                is_chirpy_red: false,
            };
            doc.users.insert(user.id.clone(), user.clone());

            Ok(user)
        })
    }

    /// Looks a user up for login.
    ///
    /// An unknown email yields [`StoreError::Unauthorized`] rather than
    /// `NotFound`, so callers cannot tell which emails are registered.
    pub fn get_by_email(&self, email: &str) -> Result<User> {
        self.store.read(|doc| {
            find_by_email(&doc.users, email)
                .cloned()
                .ok_or(StoreError::Unauthorized)
        })
    }

    pub fn get_by_id(&self, id: &str) -> Result<User> {
        self.store.read(|doc| {
            doc.users
                .get(id)
                .cloned()
                .ok_or(StoreError::NotFound("user"))
        })
    }

    /// Replaces the email and password hash of an existing user.
    ///
    /// Keeping one's own email is allowed; taking another user's is a
    /// [`StoreError::Conflict`]. The promotion flag is kept as is.
    pub fn update(&self, id: &str, new_email: &str, new_password_hash: &str) -> Result<User> {
        self.store.update(|doc| {
            if find_by_email(&doc.users, new_email).is_some_and(|other| other.id != id) {
                return Err(StoreError::Conflict);
            }

            let user = doc.users.get_mut(id).ok_or(StoreError::NotFound("user"))?;
            user.email = new_email.to_owned();
            user.password_hash = new_password_hash.to_owned();

            Ok(user.clone())
        })
    }

    /// Sets the promotion flag, leaving every other field untouched.
    pub fn promote(&self, id: &str) -> Result<User> {
        self.store.update(|doc| {
            let user = doc.users.get_mut(id).ok_or(StoreError::NotFound("user"))?;
            user.is_chirpy_red = true;
            Ok(user.clone())
        })
    }
}

fn find_by_email<'a>(users: &'a BTreeMap<String, User>, email: &str) -> Option<&'a User> {
    users.values().find(|user| user.email == email)
}
