//! Backends that persist the document

use std::fs;
use std::path::{Path, PathBuf};

use redb::{ReadableDatabase, TableDefinition, TableError};

use super::Backend;
use crate::error::Result;
use crate::model::Document;

/// Stores the document as a JSON file
///
/// Saves are written to a sibling `.tmp` file first and then renamed over the
/// target, so an interrupted save leaves the previous document in place.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

impl Backend for JsonFileBackend {
    fn exists(&self) -> Result<bool> {
        Ok(self.path.try_exists()?)
    }

    fn read(&self) -> Result<Document> {
        let data = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn write(&self, document: &Document) -> Result<()> {
        let data = serde_json::to_vec_pretty(document)?;
        let staging = self.staging_path();

        fs::write(&staging, data)?;
        fs::rename(&staging, &self.path)?;

        Ok(())
    }
}

/// Single-row table holding the serialized document
///
/// Key: always [`DOCUMENT_KEY`]
/// Value: JSON-serialized [`Document`]
pub const TABLE_DOCUMENT: TableDefinition<&str, &str> = TableDefinition::new("document_v1");

const DOCUMENT_KEY: &str = "document";

/// Stores the document inside an embedded redb database
///
/// Each save is one redb write transaction, so the previous document stays
/// intact until the commit succeeds.
pub struct RedbBackend {
    db: redb::Database,
}

impl RedbBackend {
    /// Creates or opens the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = redb::Database::create(path).map_err(redb::Error::from)?;
        Ok(Self { db })
    }
}

impl Backend for RedbBackend {
    fn exists(&self) -> Result<bool> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;

        let table = match read_txn.open_table(TABLE_DOCUMENT) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(false),
            Err(err) => return Err(redb::Error::from(err).into()),
        };

        let found = table.get(DOCUMENT_KEY).map_err(redb::Error::from)?;
        Ok(found.is_some())
    }

    fn read(&self) -> Result<Document> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = read_txn
            .open_table(TABLE_DOCUMENT)
            .map_err(redb::Error::from)?;

        let Some(value) = table.get(DOCUMENT_KEY).map_err(redb::Error::from)? else {
            let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "document row is missing");
            return Err(missing.into());
        };

        let document = serde_json::from_str(value.value())?;
        Ok(document)
    }

    fn write(&self, document: &Document) -> Result<()> {
        let document_json = serde_json::to_string(document)?;

        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = write_txn
                .open_table(TABLE_DOCUMENT)
                .map_err(redb::Error::from)?;
            table
                .insert(DOCUMENT_KEY, document_json.as_str())
                .map_err(redb::Error::from)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;

        Ok(())
    }
}
