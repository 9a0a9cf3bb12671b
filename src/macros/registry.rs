//! Shared, ordered macro table
//!
//! The keyboard hook reads the registry on every keystroke while the control
//! surface edits it. Writers build a new list and swap it in, so a reader
//! only holds the lock long enough to clone an `Arc` and never sees a
//! half-updated macro.

use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use super::codec::{self, CodecError, SkippedLine};
use super::model::{Macro, MacroAction, MacroError};
use crate::hotkey::KeyCode;

/// Errors from registry edits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid macro: {0}")]
    Invalid(#[from] MacroError),

    #[error("no macro at index {index} (registry holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Result of a reload from disk
#[derive(Debug)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: Vec<SkippedLine>,
}

/// Ordered macro collection; earlier entries win ties during matching
#[derive(Debug, Default)]
pub struct MacroRegistry {
    macros: RwLock<Arc<Vec<Macro>>>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_macros(macros: Vec<Macro>) -> Self {
        Self {
            macros: RwLock::new(Arc::new(macros)),
        }
    }

    /// Immutable view for the matcher; later edits do not affect it
    pub fn snapshot(&self) -> Arc<Vec<Macro>> {
        Arc::clone(&self.read())
    }

    /// Copy of the current macros, in order
    pub fn list(&self) -> Vec<Macro> {
        self.read().as_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Append a macro and return its index
    pub fn add(&self, hotkeys: Vec<KeyCode>, actions: Vec<MacroAction>) -> Result<usize, RegistryError> {
        let entry = Macro::new(hotkeys, actions)?;
        let mut guard = self.write();
        let mut next = guard.as_ref().clone();
        next.push(entry);
        let index = next.len() - 1;
        *guard = Arc::new(next);
        debug!(index, "macro added");
        Ok(index)
    }

    /// Replace the hotkeys and actions of the macro at `index`
    pub fn update(
        &self,
        index: usize,
        hotkeys: Vec<KeyCode>,
        actions: Vec<MacroAction>,
    ) -> Result<(), RegistryError> {
        let entry = Macro::new(hotkeys, actions)?;
        let mut guard = self.write();
        let len = guard.len();
        if index >= len {
            return Err(RegistryError::IndexOutOfRange { index, len });
        }
        let mut next = guard.as_ref().clone();
        next[index] = entry;
        *guard = Arc::new(next);
        debug!(index, "macro updated");
        Ok(())
    }

    /// Remove and return the macro at `index`; later entries shift down
    pub fn remove(&self, index: usize) -> Result<Macro, RegistryError> {
        let mut guard = self.write();
        let len = guard.len();
        if index >= len {
            return Err(RegistryError::IndexOutOfRange { index, len });
        }
        let mut next = guard.as_ref().clone();
        let removed = next.remove(index);
        *guard = Arc::new(next);
        debug!(index, "macro removed");
        Ok(removed)
    }

    /// Replace the whole table
    pub fn replace(&self, macros: Vec<Macro>) {
        *self.write() = Arc::new(macros);
    }

    /// Replace the table with the contents of a macro file.
    ///
    /// A missing file empties the registry. On a read error the registry is
    /// left untouched.
    pub fn load_from_file(&self, path: &Path) -> Result<LoadSummary, CodecError> {
        let parsed = codec::load(path)?;
        let loaded = parsed.macros.len();
        self.replace(parsed.macros);
        info!(path = %path.display(), loaded, skipped = parsed.skipped.len(), "macros loaded");
        Ok(LoadSummary {
            loaded,
            skipped: parsed.skipped,
        })
    }

    /// Write the current table to a macro file
    pub fn save_to_file(&self, path: &Path) -> Result<(), CodecError> {
        let snapshot = self.snapshot();
        codec::save(path, &snapshot)
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<Vec<Macro>>> {
        self.macros.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<Vec<Macro>>> {
        self.macros.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Vec<MacroAction> {
        vec![MacroAction::Text { text: s.to_string() }]
    }

    #[test]
    fn test_add_update_remove() {
        let registry = MacroRegistry::new();
        assert!(registry.is_empty());

        assert_eq!(registry.add(vec![KeyCode::F1], text("one")), Ok(0));
        assert_eq!(registry.add(vec![KeyCode::CONTROL, KeyCode::F1], text("two")), Ok(1));
        assert_eq!(registry.len(), 2);

        registry.update(0, vec![KeyCode::F12], text("uno")).unwrap();
        assert_eq!(registry.list()[0].hotkeys(), &[KeyCode::F12]);
        assert_eq!(registry.list()[0].actions(), text("uno").as_slice());

        let removed = registry.remove(0).unwrap();
        assert_eq!(removed.hotkeys(), &[KeyCode::F12]);
        assert_eq!(registry.list()[0].actions(), text("two").as_slice());
    }

    #[test]
    fn test_invalid_edits_rejected() {
        let registry = MacroRegistry::new();
        assert_eq!(
            registry.add(vec![], text("x")),
            Err(RegistryError::Invalid(MacroError::EmptyHotkeys))
        );
        assert_eq!(
            registry.update(3, vec![KeyCode::F1], text("x")),
            Err(RegistryError::IndexOutOfRange { index: 3, len: 0 })
        );
        assert_eq!(
            registry.remove(0).unwrap_err(),
            RegistryError::IndexOutOfRange { index: 0, len: 0 }
        );

        registry.add(vec![KeyCode::F1], text("x")).unwrap();
        assert!(registry.update(0, vec![KeyCode::F1], vec![]).is_err());
        assert_eq!(registry.list()[0].actions(), text("x").as_slice());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let registry = MacroRegistry::new();
        registry.add(vec![KeyCode::F1], text("before")).unwrap();

        let snapshot = registry.snapshot();
        registry.update(0, vec![KeyCode::F2], text("after")).unwrap();
        registry.add(vec![KeyCode::F3], text("new")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].actions(), text("before").as_slice());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reload_replaces_everything() {
        let path = std::env::temp_dir().join(format!("winhot-registry-{}.txt", std::process::id()));
        std::fs::write(&path, "F5, TEXT, hi\nF5, WAIT, 10\nbogus line\n").unwrap();

        let registry = MacroRegistry::new();
        registry.add(vec![KeyCode::F1], text("old")).unwrap();

        let summary = registry.load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].actions().len(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("winhot-registry-save-{}.txt", std::process::id()));
        let registry = MacroRegistry::new();
        registry
            .add(
                vec![KeyCode::CONTROL, KeyCode(b'C' as u16)],
                vec![MacroAction::Combo { keys: vec![KeyCode(67), KeyCode(17)] }],
            )
            .unwrap();
        registry.save_to_file(&path).unwrap();

        let reloaded = MacroRegistry::new();
        reloaded.load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(reloaded.list(), registry.list());
    }
}
