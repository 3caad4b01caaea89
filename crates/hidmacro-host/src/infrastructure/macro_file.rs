//! JSON macro library file.
//!
//! The library is one JSON object mapping macro names to action arrays, using
//! exactly the same action schema as the `MACRO_DATA` payload:
//!
//! ```json
//! {
//!   "login": [
//!     {"type": "click", "x": 640, "y": 400, "button": "left", "delay": 0.3},
//!     {"type": "move", "x": 10, "y": 10, "delay": 0.05}
//!   ]
//! }
//! ```
//!
//! Names keep the order they have in the file, so `show` and `upload-all`
//! are reproducible.  Loading another file into the library is a destructive
//! key-wise merge: a macro with the same name is replaced as a whole.

use std::fmt;
use std::path::{Path, PathBuf};

use hidmacro_core::{Action, MacroStore, StoreError};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info};

/// Error type for macro library file operations.
#[derive(Debug, Error)]
pub enum MacroFileError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing macro file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid macro library.
    #[error("invalid macro file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A macro in the file has a name the device cannot accept.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Serde view of the file: an ordered list of `(name, actions)` entries
/// read from and written to a JSON object.
struct LibraryDocument(Vec<(String, Vec<Action>)>);

impl<'de> Deserialize<'de> for LibraryDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = LibraryDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping macro names to action arrays")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, actions)) = map.next_entry::<String, Vec<Action>>()? {
                    entries.push((name, actions));
                }
                Ok(LibraryDocument(entries))
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

/// Borrowed serialisation view over a [`MacroStore`].
struct LibraryView<'a>(&'a MacroStore);

impl Serialize for LibraryView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, actions) in self.0.iter() {
            map.serialize_entry(name, actions)?;
        }
        map.end()
    }
}

// ── Library repository ────────────────────────────────────────────────────────

/// Parses a library document from JSON text.
///
/// # Errors
///
/// Returns [`MacroFileError::Json`] (with `path` for context) if the text is
/// not a valid library, or [`MacroFileError::Store`] for an invalid name.
pub fn parse_library(text: &str, path: &Path) -> Result<MacroStore, MacroFileError> {
    let LibraryDocument(entries) =
        serde_json::from_str(text).map_err(|source| MacroFileError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut store = MacroStore::new();
    for (name, actions) in entries {
        store.put(&name, actions)?;
    }
    Ok(store)
}

/// Loads the library at `path`.
///
/// A missing file is an empty library (first run).
///
/// # Errors
///
/// Returns [`MacroFileError::Io`] for file-system errors other than "not
/// found", and [`MacroFileError::Json`] / [`MacroFileError::Store`] for bad
/// content.
pub fn load_library(path: &Path) -> Result<MacroStore, MacroFileError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let store = parse_library(&text, path)?;
            debug!("loaded {} macros from {}", store.len(), path.display());
            Ok(store)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MacroStore::new()),
        Err(source) => Err(MacroFileError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Renders `store` as pretty-printed library JSON.
///
/// # Errors
///
/// Returns [`MacroFileError::Json`] if an action cannot be serialised.
pub fn render_library(store: &MacroStore, path: &Path) -> Result<String, MacroFileError> {
    serde_json::to_string_pretty(&LibraryView(store)).map_err(|source| MacroFileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `store` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`MacroFileError::Io`] for file-system failures.
pub fn save_library(path: &Path, store: &MacroStore) -> Result<(), MacroFileError> {
    let text = render_library(store, path)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| MacroFileError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, text + "\n").map_err(|source| MacroFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("saved {} macros to {}", store.len(), path.display());
    Ok(())
}

/// Merges the library at `source` into `store` (destructive, key-wise).
///
/// Returns the number of macros imported.  On error `store` is unchanged.
///
/// # Errors
///
/// Returns [`MacroFileError`] if `source` cannot be read or parsed.  A
/// missing `source` is an error here, unlike [`load_library`].
pub fn import_library(store: &mut MacroStore, source: &Path) -> Result<usize, MacroFileError> {
    let text = std::fs::read_to_string(source).map_err(|e| MacroFileError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    let incoming = parse_library(&text, source)?;
    Ok(store.merge(incoming))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
