use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::id_gen::{IdGenerator, DEFAULT_ID_LENGTH, DEFAULT_MAX_RETRIES};
use crate::undo::DEFAULT_MAX_LENGTH;

/// Shortest id that still leaves collisions negligible for a personal forest.
const MIN_ID_LENGTH: usize = 6;
const MAX_UNDO_ENTRIES: usize = 100;

/// Per-profile settings (`mainUserSettings`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Length of the undo log
    pub max_undo_entries: usize,

    /// Length of the activity log
    pub max_activity_entries: usize,

    /// Characters in a generated node id
    pub id_length: usize,

    /// Extra attempts after an id collision
    pub id_max_retries: u32,

    /// Warn when a new bookmark's url is already in the tree
    pub warn_duplicate_urls: bool,

    /// Folder opened when a session starts
    pub start_folder: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_undo_entries: DEFAULT_MAX_LENGTH,
            max_activity_entries: 200,
            id_length: DEFAULT_ID_LENGTH,
            id_max_retries: DEFAULT_MAX_RETRIES,
            warn_duplicate_urls: true,
            start_folder: "root".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.max_undo_entries == 0 || self.max_undo_entries > MAX_UNDO_ENTRIES {
            bail!("❌ maxUndoEntries must be between 1 and {}", MAX_UNDO_ENTRIES);
        }

        if self.id_length < MIN_ID_LENGTH {
            bail!("❌ idLength must be at least {}", MIN_ID_LENGTH);
        }

        if self.id_max_retries == 0 {
            warn!("⚠️  idMaxRetries is 0: a single collision will fail the operation");
        }

        if self.start_folder.trim().is_empty() {
            bail!("❌ startFolder cannot be empty");
        }

        Ok(())
    }

    pub fn id_generator(&self) -> IdGenerator {
        IdGenerator::new(self.id_length, self.id_max_retries)
    }

    /// Set one field by its camelCase name, as typed on the command line.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        match key {
            "maxUndoEntries" => updated.max_undo_entries = parse(key, value)?,
            "maxActivityEntries" => updated.max_activity_entries = parse(key, value)?,
            "idLength" => updated.id_length = parse(key, value)?,
            "idMaxRetries" => updated.id_max_retries = parse(key, value)?,
            "warnDuplicateUrls" => updated.warn_duplicate_urls = parse(key, value)?,
            "startFolder" => updated.start_folder = value.to_string(),
            _ => bail!("❌ Unknown setting: {}", key),
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn description(&self) -> String {
        format!(
            "maxUndoEntries={}, maxActivityEntries={}, idLength={}, idMaxRetries={}, warnDuplicateUrls={}, startFolder={}",
            self.max_undo_entries,
            self.max_activity_entries,
            self.id_length,
            self.id_max_retries,
            self.warn_duplicate_urls,
            self.start_folder
        )
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("❌ Invalid value for {}: {}", key, value))
}
