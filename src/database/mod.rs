//! Document store initialization and locking
//!
//! The whole service state lives in a single [`Document`] held by a
//! [`Backend`]. A [`Store`] owns one readers-writer lock for its whole
//! lifetime and every repository operation runs inside it:
//!
//! - reads hold the shared lock while the document is loaded
//! - mutations hold the exclusive lock across load, modify and save, so two
//!   concurrent writers can never both start from the same prior state

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

mod backend;
mod chirps;
mod tokens;
mod users;

pub use backend::{JsonFileBackend, RedbBackend};
pub use chirps::ChirpRepository;
pub use tokens::TokenRepository;
pub use users::UserRepository;

use crate::error::Result;
use crate::model::Document;

/// Persistence engine behind the store
///
/// Implementations only move whole documents in and out; locking is the
/// store's job, so a backend never needs its own synchronization.
pub trait Backend: Send + Sync {
    /// Whether a document has already been persisted.
    fn exists(&self) -> Result<bool>;

    fn read(&self) -> Result<Document>;

    /// Replaces the persisted document with `document`.
    fn write(&self, document: &Document) -> Result<()>;
}

/// Which [`Backend`] to open at start-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Pretty-printed JSON file (the default)
    #[default]
    Json,
    /// Embedded redb database holding the document as one value
    Redb,
}

/// Single source of truth for the persisted document
pub struct Store {
    backend: Box<dyn Backend>,
    lock: RwLock<()>,
}

impl Store {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            lock: RwLock::new(()),
        }
    }

    /// Writes an empty document if none exists yet. Idempotent.
    pub fn ensure(&self) -> Result<()> {
        let _guard = self.exclusive();
        if !self.backend.exists()? {
            self.backend.write(&Document::default())?;
        }
        Ok(())
    }

    /// Loads the whole document under the shared lock.
    pub fn load(&self) -> Result<Document> {
        let _guard = self.shared();
        self.backend.read()
    }

    /// Replaces the whole document under the exclusive lock.
    pub fn save(&self, document: &Document) -> Result<()> {
        let _guard = self.exclusive();
        self.backend.write(document)
    }

    /// Runs `f` against a freshly loaded document while holding the shared lock.
    pub fn read<T>(&self, f: impl FnOnce(&Document) -> Result<T>) -> Result<T> {
        let _guard = self.shared();
        let document = self.backend.read()?;
        f(&document)
    }

    /// Runs a load-modify-save cycle as one critical section.
    ///
    /// The document is only written back when `f` succeeds; an error from
    /// `f` leaves the persisted state untouched.
    pub fn update<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let _guard = self.exclusive();
        let mut document = self.backend.read()?;
        let output = f(&mut document)?;
        self.backend.write(&document)?;
        Ok(output)
    }

    // The lock guards no data of its own (the document lives in the backend),
    // so a panic in another holder cannot leave anything half-updated here.
    fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The repositories over one shared [`Store`]
///
/// Cloning is cheap: every clone points at the same store and lock.
#[derive(Clone)]
pub struct Database {
    pub chirps: ChirpRepository,
    pub users: UserRepository,
    pub tokens: TokenRepository,
    store: Arc<Store>,
}

impl Database {
    /// Makes sure a document exists, then wires the repositories to `store`.
    pub fn open(store: Store) -> Result<Self> {
        store.ensure()?;
        let store = Arc::new(store);

        Ok(Self {
            chirps: ChirpRepository::new(Arc::clone(&store)),
            users: UserRepository::new(Arc::clone(&store)),
            tokens: TokenRepository::new(Arc::clone(&store)),
            store,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// Opens (creating if needed) the document at `db_path`
///
/// # Example
///
/// ```no_run
/// # use chirpy::database::{init_db, BackendKind};
/// let db = init_db("database.json", BackendKind::Json).expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: impl AsRef<Path>, kind: BackendKind) -> Result<Database> {
    let store = match kind {
        BackendKind::Json => Store::new(JsonFileBackend::new(db_path)),
        BackendKind::Redb => Store::new(RedbBackend::open(db_path)?),
    };

    Database::open(store)
}
