//! Config registry: the fixed set of loaded mapping tables.
//!
//! Slots are allocated first-fit and never compacted. Translation visits
//! occupied slots in ascending index order, so a hole left by
//! [`ConfigRegistry::remove`] is skipped until a later load fills it.
//! The file list, by contrast, records paths in load order.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::lircrc::{LircrcLoader, MappingTable};

/// Number of tables a session can hold
pub const MAX_CONFIGS: usize = 20;

/// An occupied registry slot
#[derive(Debug, Clone)]
pub struct ConfigSlot {
    /// Path as given by the caller; empty for the default lircrc
    pub source: String,
    pub table: MappingTable,
}

#[derive(Debug)]
pub struct ConfigRegistry {
    slots: Vec<Option<ConfigSlot>>,
    files: Vec<String>,
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(MAX_CONFIGS).collect(),
            files: Vec::new(),
        }
    }

    /// Load each path into the first free slot, in order. Stops at the
    /// first failure; paths loaded before it stay loaded.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegistryFull` naming the first path that found no
    /// free slot, or `Error::ConfigLoad` if a table fails to load. Neither
    /// consumes a slot.
    pub fn add<I, S>(&mut self, paths: I, loader: &LircrcLoader) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.add_one(path.as_ref(), loader)?;
        }
        Ok(())
    }

    fn add_one(&mut self, path: &str, loader: &LircrcLoader) -> Result<usize> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Err(Error::RegistryFull {
                path: path.to_string(),
            });
        };

        let table = loader.load(path)?;
        self.slots[index] = Some(ConfigSlot {
            source: path.to_string(),
            table,
        });
        self.files.push(path.to_string());
        debug!("Loaded config '{}' into slot {}", path, index);
        Ok(index)
    }

    /// Free the lowest slot holding `path`, leaving a hole.
    /// Returns the freed slot index.
    pub fn remove(&mut self, path: &str) -> Option<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.source == path))?;
        self.slots[index] = None;
        if let Some(position) = self.files.iter().position(|f| f == path) {
            self.files.remove(position);
        }
        debug!("Freed config slot {} ('{}')", index, path);
        Some(index)
    }

    /// Free every slot and forget the file list.
    pub fn clear(&mut self) {
        let freed = self.slots.iter_mut().filter_map(Option::take).count();
        self.files.clear();
        if freed > 0 {
            info!("Cleared {} config slot(s)", freed);
        }
    }

    /// Free every slot but remember the file list, so a later reload can
    /// replay it.
    pub fn release(&mut self) {
        let freed = self.slots.iter_mut().filter_map(Option::take).count();
        if freed > 0 {
            debug!("Released {} config slot(s)", freed);
        }
    }

    /// Paths in load order
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Occupied slots as `(index, source)`, ascending
    pub fn slots(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i, s.source.as_str())))
    }

    /// Table in slot 0, the one the `mode` property reads and writes
    #[must_use]
    pub fn first_table(&self) -> Option<&MappingTable> {
        self.slots[0].as_ref().map(|s| &s.table)
    }

    pub fn first_table_mut(&mut self) -> Option<&mut MappingTable> {
        self.slots[0].as_mut().map(|s| &mut s.table)
    }

    pub(crate) fn slots_mut(&mut self) -> std::slice::IterMut<'_, Option<ConfigSlot>> {
        self.slots.iter_mut()
    }
}
