//! Store connections: URI parsing, connect/close and scoped acquisition.
//!
//! Two backends are supported:
//! - `memory://[name]` keeps everything in process memory;
//! - `file://<path>` replays a journal on connect and appends every write to it.

use crate::collection::Collection;
use crate::errors::DbError;
use crate::journal::{Journal, JournalRecord};
use crate::types::CollectionName;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUri {
    Memory { name: String },
    File { path: PathBuf },
}

impl FromStr for ConnectionUri {
    type Err = DbError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let uri = uri.trim();
        if let Some(name) = uri.strip_prefix("memory://") {
            return Ok(Self::Memory { name: name.to_string() });
        }
        if let Some(path) = uri.strip_prefix("file://") {
            if path.is_empty() {
                return Err(DbError::Connection(format!("missing path in {uri:?}")));
            }
            return Ok(Self::File { path: PathBuf::from(path) });
        }
        let scheme = uri.split_once("://").map_or(uri, |(s, _)| s);
        Err(DbError::Connection(format!("unsupported store scheme {scheme:?} (expected memory:// or file://)")))
    }
}

impl fmt::Display for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory { name } => write!(f, "memory://{name}"),
            Self::File { path } => write!(f, "file://{}", path.display()),
        }
    }
}

/// State shared between a connection and the collections it handed out.
#[derive(Debug)]
pub(crate) struct Link {
    open: AtomicBool,
    journal: Option<Mutex<Journal>>,
}

impl Link {
    pub(crate) fn ensure_open(&self) -> Result<(), DbError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DbError::Connection("connection is closed".into()))
        }
    }

    pub(crate) fn record(&self, rec: &JournalRecord) -> Result<(), DbError> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        journal.lock().append(rec).map_err(|e| match e {
            DbError::Connection(_) => e,
            other => DbError::Connection(format!("journal write failed: {other}")),
        })
    }

    fn shutdown(&self) -> Result<(), DbError> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        match &self.journal {
            Some(j) => j.lock().close(),
            None => Ok(()),
        }
    }
}

/// A single handle to a document store.
pub struct Connection {
    uri: ConnectionUri,
    link: Arc<Link>,
    collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("uri", &self.uri).field("open", &self.is_open()).finish()
    }
}

/// Open a connection to the store named by `uri`.
///
/// # Errors
/// Returns `Connection` if the scheme is unknown, the target directory does not exist,
/// or the journal cannot be opened or replayed.
pub fn connect(uri: &str) -> Result<Connection, DbError> {
    Connection::open(uri.parse()?)
}

/// Connect, run `f`, and close the connection whether `f` succeeded or not.
///
/// An error from `f` takes precedence over an error from closing.
///
/// # Errors
/// Returns the first error raised by connecting, by `f`, or by closing.
pub fn with_connection<T, F>(uri: &str, f: F) -> Result<T, DbError>
where
    F: FnOnce(&Connection) -> Result<T, DbError>,
{
    let conn = connect(uri)?;
    let result = f(&conn);
    let closed = conn.close();
    match (result, closed) {
        (Ok(v), Ok(())) => Ok(v),
        (Err(e), Err(close_err)) => {
            log::warn!("close after failure also failed: {close_err}");
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
    }
}

impl Connection {
    /// # Errors
    /// See [`connect`].
    pub fn open(uri: ConnectionUri) -> Result<Self, DbError> {
        let (journal, records) = match &uri {
            ConnectionUri::Memory { .. } => (None, Vec::new()),
            ConnectionUri::File { path } => {
                check_reachable(path)?;
                let (journal, records) = Journal::open(path)
                    .map_err(|e| DbError::Connection(format!("cannot open {}: {e}", path.display())))?;
                (Some(Mutex::new(journal)), records)
            }
        };
        let conn = Self {
            uri,
            link: Arc::new(Link { open: AtomicBool::new(true), journal }),
            collections: RwLock::new(HashMap::new()),
        };
        let replayed = records.len();
        for rec in &records {
            conn.collection(&rec.collection)?
                .replay(rec)
                .map_err(|e| DbError::Connection(format!("journal replay failed: {e}")))?;
        }
        log::info!("connected to {} ({replayed} journal records)", conn.uri);
        Ok(conn)
    }

    #[must_use]
    pub const fn uri(&self) -> &ConnectionUri {
        &self.uri
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.link.ensure_open().is_ok()
    }

    /// Get a collection, creating it on first use.
    ///
    /// # Errors
    /// `Connection` if the connection is closed.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.link.ensure_open()?;
        if let Some(col) = self.collections.read().get(name) {
            return Ok(Arc::clone(col));
        }
        let mut cols = self.collections.write();
        let col = cols
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Collection::new(name.to_string(), Arc::clone(&self.link))));
        Ok(Arc::clone(col))
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Flush and release the store. Collections obtained from this connection stop working.
    ///
    /// # Errors
    /// `Io` if the journal cannot be flushed.
    pub fn close(self) -> Result<(), DbError> {
        self.link.shutdown()?;
        log::info!("disconnected from {}", self.uri);
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.link.shutdown() {
            log::error!("closing {} on drop failed: {e}", self.uri);
        }
    }
}

fn check_reachable(path: &Path) -> Result<(), DbError> {
    if path.is_dir() {
        return Err(DbError::Connection(format!("{} is a directory", path.display())));
    }
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => Err(DbError::Connection(format!(
            "store unreachable: directory {} does not exist",
            dir.display()
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_schemes() {
        assert_eq!("memory://".parse::<ConnectionUri>().unwrap(), ConnectionUri::Memory { name: String::new() });
        assert_eq!(
            "file:///tmp/notes.journal".parse::<ConnectionUri>().unwrap(),
            ConnectionUri::File { path: PathBuf::from("/tmp/notes.journal") }
        );
        assert_eq!("file://notes.journal".parse::<ConnectionUri>().unwrap().to_string(), "file://notes.journal");
    }

    #[test]
    fn rejects_unknown_schemes_as_connection_errors() {
        assert!(matches!("mongodb://localhost/noteful".parse::<ConnectionUri>(), Err(DbError::Connection(_))));
        assert!(matches!("file://".parse::<ConnectionUri>(), Err(DbError::Connection(_))));
    }

    #[test]
    fn closed_connection_rejects_collection_handles() {
        let conn = connect("memory://closing").unwrap();
        let col = conn.collection("notes").unwrap();
        conn.close().unwrap();
        assert!(matches!(col.documents(), Err(DbError::Connection(_))));
    }

    #[test]
    fn with_connection_prefers_the_callers_error() {
        let err = with_connection("memory://scoped", |_| -> Result<(), DbError> {
            Err(DbError::Validation("boom".into()))
        })
        .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }
}
