//! In-memory macro store.
//!
//! Maps macro names to ordered action lists.  Iteration order is insertion
//! order, which keeps `LIST` replies and saved files reproducible.  Replacing
//! an existing macro keeps its original position.
//!
//! Action lists are stored as `Arc<[Action]>`.  The playback engine clones the
//! `Arc` when a session starts, so overwriting a macro while it is playing
//! swaps the store entry without touching the running session's snapshot.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::action::{parse_actions, Action, ActionError};

/// Errors returned by [`MacroStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The action payload failed to parse or validate.
    #[error("malformed macro '{name}': {source}")]
    MalformedMacro {
        name: String,
        #[source]
        source: ActionError,
    },

    /// No macro with this name is stored.
    #[error("macro not found: '{0}'")]
    MacroNotFound(String),

    /// The name is empty or contains a reserved character.
    #[error("invalid macro name: {0:?}")]
    InvalidName(String),
}

/// Characters that would break command framing (`:`, line breaks) or the
/// comma-separated `LIST` reply.
const RESERVED_NAME_CHARS: &[char] = &[':', ',', '\r', '\n'];

/// Checks that `name` can travel inside a command line and a `LIST` reply.
///
/// # Errors
///
/// Returns [`StoreError::InvalidName`] for an empty name or one containing
/// `:`, `,`, `\r` or `\n`.
pub fn validate_macro_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.contains(RESERVED_NAME_CHARS) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Ordered name → actions mapping.
#[derive(Debug, Clone, Default)]
pub struct MacroStore {
    entries: Vec<(String, Arc<[Action]>)>,
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `actions` under `name`, replacing any existing macro.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if the name is not transmissible;
    /// the store is unchanged in that case.
    pub fn put(&mut self, name: &str, actions: Vec<Action>) -> Result<(), StoreError> {
        validate_macro_name(name)?;
        let count = actions.len();
        let actions: Arc<[Action]> = actions.into();

        match self.position(name) {
            Some(index) => {
                self.entries[index].1 = actions;
                info!("replaced macro '{name}' ({count} actions)");
            }
            None => {
                self.entries.push((name.to_string(), actions));
                info!("stored macro '{name}' ({count} actions)");
            }
        }
        Ok(())
    }

    /// Parses a JSON action array and stores it under `name`.
    ///
    /// Parsing completes before the store is touched, so a malformed payload
    /// leaves any previous macro of the same name intact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MalformedMacro`] for an invalid payload and
    /// [`StoreError::InvalidName`] for an invalid name.
    pub fn put_json(&mut self, name: &str, payload: &str) -> Result<(), StoreError> {
        validate_macro_name(name)?;
        let actions = parse_actions(payload).map_err(|source| {
            debug!("rejected payload for macro '{name}': {source}");
            StoreError::MalformedMacro {
                name: name.to_string(),
                source,
            }
        })?;
        self.put(name, actions)
    }

    /// Returns a shared snapshot of the actions stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MacroNotFound`] if no such macro exists.
    pub fn get(&self, name: &str) -> Result<Arc<[Action]>, StoreError> {
        self.position(name)
            .map(|index| Arc::clone(&self.entries[index].1))
            .ok_or_else(|| StoreError::MacroNotFound(name.to_string()))
    }

    /// Removes and returns the macro stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MacroNotFound`] if no such macro exists.
    pub fn remove(&mut self, name: &str) -> Result<Arc<[Action]>, StoreError> {
        let index = self
            .position(name)
            .ok_or_else(|| StoreError::MacroNotFound(name.to_string()))?;
        Ok(self.entries.remove(index).1)
    }

    /// Stored names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// `(name, actions)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Action])> {
        self.entries
            .iter()
            .map(|(name, actions)| (name.as_str(), actions.as_ref()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destructive key-wise merge: every macro in `other` overwrites the
    /// same-named macro here (whole list, not element-wise); new names are
    /// appended in `other`'s order.  Returns the number of macros merged.
    pub fn merge(&mut self, other: MacroStore) -> usize {
        let count = other.entries.len();
        for (name, actions) in other.entries {
            match self.position(&name) {
                Some(index) => self.entries[index].1 = actions,
                None => self.entries.push((name, actions)),
            }
        }
        count
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
