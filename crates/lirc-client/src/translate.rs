//! Code translator: expands one raw code against every loaded table.

use std::fmt;
use std::iter::Enumerate;
use std::slice::IterMut;

use tracing::warn;

use crate::code::{DecodedCode, MalformedCode, RawCode};
use crate::registry::{ConfigRegistry, ConfigSlot};

/// Result of translating a raw code against one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicEvent {
    pub button: String,
    pub slot: usize,
    pub source: String,
}

/// A table that could not translate a code. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationWarning {
    pub slot: usize,
    pub source: String,
    pub reason: String,
}

impl fmt::Display for TranslationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config slot {} ('{}') could not translate code: {}",
            self.slot, self.source, self.reason
        )
    }
}

/// Lazy sequence of [`SymbolicEvent`]s for one raw code.
///
/// Slots are visited in ascending index order and each slot is drained
/// before the next. The sequence cannot be restarted: tables keep
/// per-code state for repeats and button sequences.
pub struct Translations<'a> {
    slots: Enumerate<IterMut<'a, Option<ConfigSlot>>>,
    current: Option<(usize, &'a mut ConfigSlot)>,
    code: Result<DecodedCode, MalformedCode>,
    program: &'a str,
    warnings: Vec<TranslationWarning>,
}

impl<'a> Translations<'a> {
    pub fn new(registry: &'a mut ConfigRegistry, raw: &RawCode, program: &'a str) -> Self {
        Self {
            slots: registry.slots_mut().enumerate(),
            current: None,
            code: raw.decode(),
            program,
            warnings: Vec::new(),
        }
    }

    /// Warnings raised so far
    #[must_use]
    pub fn warnings(&self) -> &[TranslationWarning] {
        &self.warnings
    }

    fn advance_slot(&mut self) -> bool {
        for (index, slot) in self.slots.by_ref() {
            if let Some(slot) = slot {
                slot.table.begin_scan();
                self.current = Some((index, slot));
                return true;
            }
        }
        false
    }
}

impl Iterator for Translations<'_> {
    type Item = SymbolicEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((index, slot)) = self.current.as_mut() {
                match &self.code {
                    Ok(code) => {
                        if let Some(button) = slot.table.next_translation(code, self.program) {
                            return Some(SymbolicEvent {
                                button,
                                slot: *index,
                                source: slot.source.clone(),
                            });
                        }
                    }
                    Err(e) => {
                        let warning = TranslationWarning {
                            slot: *index,
                            source: slot.source.clone(),
                            reason: e.to_string(),
                        };
                        warn!("{}", warning);
                        self.warnings.push(warning);
                    }
                }
                self.current = None;
            }

            if !self.advance_slot() {
                return None;
            }
        }
    }
}

impl ConfigRegistry {
    /// Translate `raw` against every loaded table on behalf of `program`.
    pub fn translate<'a>(&'a mut self, raw: &RawCode, program: &'a str) -> Translations<'a> {
        Translations::new(self, raw, program)
    }
}
