//! Prover symbol table cache
//!
//! Filled from the server's `symbols` notification. Lookup by name or by
//! input abbreviation; rendering and input methods live elsewhere.

use std::collections::HashMap;

use crate::connection::Connection;
use crate::protocol::{ClientNotification, SymbolEntry, SymbolsParams};

#[derive(Debug, Default)]
pub struct SymbolCache {
    entries: Vec<SymbolEntry>,
    by_name: HashMap<String, usize>,
    by_abbrev: HashMap<String, usize>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, connection: &Connection) {
        connection.send(ClientNotification::SymbolsRequest);
    }

    /// Replace the whole table
    pub fn on_symbols(&mut self, params: SymbolsParams) {
        self.by_name.clear();
        self.by_abbrev.clear();
        for (index, entry) in params.entries.iter().enumerate() {
            self.by_name.insert(entry.name.clone(), index);
            for abbrev in &entry.abbrevs {
                // First entry wins for shared abbreviations
                self.by_abbrev.entry(abbrev.clone()).or_insert(index);
            }
        }
        self.entries = params.entries;
        tracing::info!(count = self.entries.len(), "Symbol table loaded");
    }

    pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn by_abbrev(&self, abbrev: &str) -> Option<&SymbolEntry> {
        self.by_abbrev.get(abbrev).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
