use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{TreeError, TreeResult};
use crate::node::Node;
use crate::tree;

pub const DEFAULT_ID_LENGTH: usize = 12;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Random alphanumeric node ids, checked against the live forest.
#[derive(Debug, Clone, Copy)]
pub struct IdGenerator {
    pub length: usize,
    pub max_retries: u32,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_ID_LENGTH,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl IdGenerator {
    pub fn new(length: usize, max_retries: u32) -> Self {
        Self { length, max_retries }
    }

    fn candidate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }

    /// Draw ids until one is not taken. Gives up with
    /// `IdCollisionExhausted` after `1 + max_retries` attempts.
    pub fn generate<F>(&self, is_taken: F) -> TreeResult<String>
    where
        F: Fn(&str) -> bool,
    {
        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            let id = self.candidate();
            if !is_taken(&id) {
                return Ok(id);
            }
            debug!("🎲 Id collision on attempt {}: {}", attempt, id);
        }
        warn!("⚠️  Id generation exhausted after {} attempts", attempts);
        Err(TreeError::IdCollisionExhausted { attempts })
    }

    /// One id that does not exist anywhere in `forest`.
    pub fn generate_for(&self, forest: &[Node]) -> TreeResult<String> {
        self.generate(|id| tree::contains_id(forest, id))
    }

    /// An id not in `taken`; it is added to `taken` before returning so a
    /// batch of calls never hands out the same id twice.
    pub fn generate_unique(&self, taken: &mut HashSet<String>) -> TreeResult<String> {
        let id = self.generate(|candidate| taken.contains(candidate))?;
        taken.insert(id.clone());
        Ok(id)
    }
}
