//! File format for moving a whole campaign between stores

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bumped when the bundle layout changes incompatibly.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Every top-level object of an owner, grouped by type prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub objects: BTreeMap<String, Vec<serde_json::Value>>,
}

impl ExportBundle {
    pub fn new(exported_at: DateTime<Utc>) -> Self {
        Self {
            format_version: EXPORT_FORMAT_VERSION,
            exported_at,
            objects: BTreeMap::new(),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Roots that did not exist before
    pub created: usize,
    /// Roots that were already present and left unchanged
    pub unchanged: usize,
}
