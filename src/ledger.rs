//! Item -> code stock, persisted as a single JSON document.
//!
//! Every mutation is applied to a copy of the item map, written to disk, and
//! only then committed in memory. A failed write therefore leaves the ledger
//! exactly as it was before the call.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::error::{Result, StockError};

/// Codes per item, oldest first.
pub type Items = BTreeMap<String, VecDeque<String>>;

/// Item names are matched case-insensitively.
pub fn normalize(item: &str) -> String {
    item.to_lowercase()
}

#[derive(Debug)]
pub struct StockLedger {
    path: PathBuf,
    items: Items,
}

impl StockLedger {
    /// Load the ledger stored at `path`. A missing or blank file is an empty
    /// ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = read_items(&path)?;
        debug!(path = %path.display(), items = items.len(), "loaded stock");
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `codes` to `item`, creating it if needed. Returns how many codes
    /// were added.
    pub fn add(&mut self, item: &str, codes: Vec<String>) -> Result<usize> {
        let item = normalize(item);
        if item.is_empty() {
            return Err(StockError::Validation("item name is empty".into()));
        }
        if codes.is_empty() {
            return Err(StockError::Validation(
                "at least one code must be provided".into(),
            ));
        }
        if codes.iter().any(|code| code.is_empty()) {
            return Err(StockError::Validation("codes must not be empty".into()));
        }

        let added = codes.len();
        let mut next = self.items.clone();
        next.entry(item.clone()).or_default().extend(codes);
        self.commit(next)?;

        info!(%item, added, total = self.count(&item), "added stock");
        Ok(added)
    }

    /// Remove and return the oldest code for `item`.
    pub fn generate(&mut self, item: &str) -> Result<String> {
        let item = normalize(item);
        let mut next = self.items.clone();
        let code = next
            .get_mut(&item)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| StockError::NotFound(item.clone()))?;
        self.commit(next)?;

        info!(%item, remaining = self.count(&item), "dispensed code");
        Ok(code)
    }

    /// Available code counts per item. Codes themselves are never exposed.
    pub fn list(&self) -> BTreeMap<String, usize> {
        self.items
            .iter()
            .map(|(item, codes)| (item.clone(), codes.len()))
            .collect()
    }

    /// Codes currently available for `item`; zero for unknown items.
    pub fn count(&self, item: &str) -> usize {
        self.items.get(&normalize(item)).map_or(0, VecDeque::len)
    }

    /// Drop `item` together with any undispensed codes. Returns how many codes
    /// were discarded.
    pub fn delete(&mut self, item: &str) -> Result<usize> {
        let item = normalize(item);
        let mut next = self.items.clone();
        let discarded = next
            .remove(&item)
            .ok_or_else(|| StockError::NotFound(item.clone()))?
            .len();
        self.commit(next)?;

        info!(%item, discarded, "deleted stock category");
        Ok(discarded)
    }

    fn commit(&mut self, next: Items) -> Result<()> {
        write_items(&self.path, &next)?;
        self.items = next;
        Ok(())
    }
}

fn read_items(path: &Path) -> Result<Items> {
    if !path.exists() {
        return Ok(Items::new());
    }
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(Items::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

fn write_items(path: &Path, items: &Items) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    items.serialize(&mut ser)?;
    fs::write(path, buf)?;
    Ok(())
}
