use std::sync::Arc;

use super::Store;
use crate::error::{Result, StoreError};
use crate::model::{Chirp, SortOrder};

/// Chirp records of the shared document
#[derive(Clone)]
pub struct ChirpRepository {
    store: Arc<Store>,
}

impl ChirpRepository {
    pub(super) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Stores a new chirp under the next unused id.
    pub fn create(&self, body: &str, author_id: &str) -> Result<Chirp> {
        self.store.update(|doc| {
            let id = doc.next_chirp_id;
            doc.next_chirp_id += 1;

            let chirp = Chirp {
                id,
                body: body.to_owned(),
                author_id: author_id.to_owned(),
            };
            doc.chirps.insert(id, chirp.clone());

            Ok(chirp)
        })
    }

    /// Removes a chirp. Deleting an id that does not exist is not an error.
    ///
    /// No ownership check happens here; callers must verify the author first.
    pub fn delete(&self, id: u64) -> Result<()> {
        self.store.update(|doc| {
            doc.chirps.remove(&id);
            Ok(())
        })
    }

    /// Returns every chirp matching `filter`, ordered by id.
    pub fn list(&self, order: SortOrder, filter: impl Fn(&Chirp) -> bool) -> Result<Vec<Chirp>> {
        let mut chirps = self.store.read(|doc| {
            Ok(doc
                .chirps
                .values()
                .filter(|chirp| filter(chirp))
                .cloned()
                .collect::<Vec<_>>())
        })?;

        match order {
            SortOrder::Ascending => chirps.sort_by_key(|chirp| chirp.id),
            SortOrder::Descending => chirps.sort_by(|a, b| b.id.cmp(&a.id)),
        }

        Ok(chirps)
    }

    pub fn get_by_id(&self, id: u64) -> Result<Chirp> {
        self.store.read(|doc| {
            doc.chirps
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound("chirp"))
        })
    }

    pub fn get_by_author(&self, author_id: &str, order: SortOrder) -> Result<Vec<Chirp>> {
        self.list(order, |chirp| chirp.author_id == author_id)
    }
}
