//! Per-entry undo/redo log.
//!
//! Entries do not form a two-stack history: each one tracks on its own
//! whether it can still be undone (`disabled_undo`) or redone
//! (`disabled_redo`), so any entry can be reversed or replayed in any order
//! as long as the forest still has room for it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{TreeError, TreeResult};
use crate::node::{now_millis, Node};
use crate::ops::{self, Relocation, Removed};
use crate::tree::find_node;

pub const DEFAULT_MAX_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Deleted,
    Moved,
    Duplicated,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Deleted => "deleted",
            ActionKind::Moved => "moved",
            ActionKind::Duplicated => "duplicated",
        }
    }
}

/// One reversible mutation.
///
/// `item` is the node as it was before a delete or move, or the created copy
/// for a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub timestamp: i64,
    pub item: Node,
    pub old_parent_id: String,
    pub old_index: usize,
    pub new_parent_id: Option<String>,
    pub new_index: Option<usize>,
    pub disabled_undo: bool,
    pub disabled_redo: bool,
}

impl UndoEntry {
    fn new(kind: ActionKind, item: Node, old_parent_id: String, old_index: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            timestamp: now_millis(),
            item,
            old_parent_id,
            old_index,
            new_parent_id: None,
            new_index: None,
            disabled_undo: false,
            disabled_redo: true,
        }
    }

    pub fn deleted(removed: &Removed) -> Self {
        Self::new(ActionKind::Deleted, removed.node.clone(), removed.parent_id.clone(), removed.index)
    }

    /// `snapshot` is the moved node taken before the move.
    pub fn moved(snapshot: Node, relocation: &Relocation) -> Self {
        let mut entry = Self::new(
            ActionKind::Moved,
            snapshot,
            relocation.old_parent_id.clone(),
            relocation.old_index,
        );
        entry.new_parent_id = Some(relocation.new_parent_id.clone());
        entry.new_index = Some(relocation.new_index);
        entry
    }

    /// `copy` is the freshly created duplicate as it sits in the forest.
    pub fn duplicated(copy: Node, source_parent_id: String, copy_index: usize) -> Self {
        let new_parent_id = copy.parent_id.clone();
        let mut entry = Self::new(ActionKind::Duplicated, copy, source_parent_id, copy_index);
        entry.new_parent_id = Some(new_parent_id);
        entry.new_index = Some(copy_index);
        entry
    }

    pub fn can_undo(&self) -> bool {
        !self.disabled_undo
    }

    pub fn can_redo(&self) -> bool {
        !self.disabled_redo
    }

    fn target(&self) -> TreeResult<(&str, usize)> {
        match (&self.new_parent_id, self.new_index) {
            (Some(parent), Some(index)) => Ok((parent.as_str(), index)),
            _ => Err(TreeError::invalid(format!("log entry '{}' has no destination", self.id))),
        }
    }
}

/// Bounded log of reversible mutations, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoLog {
    pub max_length: usize,
    pub entries: VecDeque<UndoEntry>,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl UndoLog {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            entries: VecDeque::new(),
        }
    }

    /// Append `entry`, evicting the oldest entries beyond `max_length`.
    pub fn add_action(&mut self, entry: UndoEntry) {
        debug!("📝 Logged {} of {}", entry.kind.name(), entry.item.id);
        self.entries.push_back(entry);
        self.truncate();
    }

    pub fn set_max_length(&mut self, max_length: usize) {
        self.max_length = max_length;
        self.truncate();
    }

    fn truncate(&mut self) {
        while self.entries.len() > self.max_length {
            if let Some(evicted) = self.entries.pop_front() {
                debug!("🧹 Evicted log entry {}", evicted.id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, entry_id: &str) -> Option<&UndoEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    /// Newest entry that can still be undone.
    pub fn latest_undoable(&self) -> Option<&UndoEntry> {
        self.entries.iter().rev().find(|e| e.can_undo())
    }

    /// Newest entry that can still be redone.
    pub fn latest_redoable(&self) -> Option<&UndoEntry> {
        self.entries.iter().rev().find(|e| e.can_redo())
    }

    fn position(&self, entry_id: &str) -> TreeResult<usize> {
        self.entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| TreeError::not_found(format!("log entry '{}'", entry_id)))
    }

    /// Reverse the mutation recorded by `entry_id`.
    pub fn undo(&mut self, forest: &mut [Node], entry_id: &str) -> TreeResult<()> {
        let pos = self.position(entry_id)?;
        let entry = &mut self.entries[pos];
        if !entry.can_undo() {
            return Err(TreeError::invalid(format!("log entry '{}' is already undone", entry_id)));
        }

        match entry.kind {
            ActionKind::Deleted => {
                ops::restore(forest, entry.item.clone(), &entry.old_parent_id, entry.old_index)?;
            }
            ActionKind::Moved => {
                ops::move_to_index(forest, &entry.item.id, &entry.old_parent_id, entry.old_index)?;
                refresh_snapshot(forest, entry);
            }
            ActionKind::Duplicated => {
                ensure_present(forest, &entry.item.id)?;
                // The copy may have been edited since it was made.
                let removed = ops::delete(forest, &entry.item.id)?;
                entry.item = removed.node;
                entry.new_parent_id = Some(removed.parent_id);
                entry.new_index = Some(removed.index);
            }
        }

        entry.disabled_undo = true;
        entry.disabled_redo = false;
        info!("↩️  Undid {} of '{}'", entry.kind.name(), entry.item.title);
        Ok(())
    }

    /// Apply the mutation recorded by `entry_id` again after an undo.
    pub fn redo(&mut self, forest: &mut [Node], entry_id: &str) -> TreeResult<()> {
        let pos = self.position(entry_id)?;
        let entry = &mut self.entries[pos];
        if !entry.can_redo() {
            return Err(TreeError::invalid(format!("log entry '{}' has nothing to redo", entry_id)));
        }

        match entry.kind {
            ActionKind::Deleted => {
                // Keep what the subtree looks like now, not at the first delete.
                let removed = ops::delete(forest, &entry.item.id)?;
                entry.item = removed.node;
                entry.old_parent_id = removed.parent_id;
                entry.old_index = removed.index;
            }
            ActionKind::Moved => {
                let (parent, index) = entry.target()?;
                ops::move_to_index(forest, &entry.item.id, parent, index)?;
                refresh_snapshot(forest, entry);
            }
            ActionKind::Duplicated => {
                let (parent, index) = entry.target()?;
                ops::restore(forest, entry.item.clone(), parent, index)?;
            }
        }

        entry.disabled_undo = false;
        entry.disabled_redo = true;
        info!("↪️  Redid {} of '{}'", entry.kind.name(), entry.item.title);
        Ok(())
    }
}

/// Moves replay on the live node; the snapshot only labels the entry.
fn refresh_snapshot(forest: &[Node], entry: &mut UndoEntry) {
    if let Some(live) = find_node(forest, &entry.item.id) {
        entry.item = live.clone();
    }
}

fn ensure_present(forest: &[Node], id: &str) -> TreeResult<()> {
    find_node(forest, id)
        .map(|_| ())
        .ok_or_else(|| TreeError::not_found(format!("node '{}'", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_gen::IdGenerator;
    use crate::tree::{find_node, fixtures::sample_forest};
    use crate::validator::check_forest;

    fn child_ids(forest: &[Node], parent: &str) -> Vec<String> {
        find_node(forest, parent)
            .unwrap()
            .children
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }

    fn log_delete(forest: &mut Vec<Node>, log: &mut UndoLog, id: &str) -> String {
        let removed = ops::delete(forest, id).unwrap();
        let entry = UndoEntry::deleted(&removed);
        let entry_id = entry.id.clone();
        log.add_action(entry);
        entry_id
    }

    #[test]
    fn test_delete_then_undo_restores_node() {
        let mut forest = sample_forest();
        let original = find_node(&forest, "B1").unwrap().clone();
        let mut log = UndoLog::default();

        let entry_id = log_delete(&mut forest, &mut log, "B1");
        assert!(find_node(&forest, "B1").is_none());
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(&entry_id).unwrap().kind, ActionKind::Deleted);

        log.undo(&mut forest, &entry_id).unwrap();
        let restored = find_node(&forest, "B1").unwrap();
        assert_eq!(restored.parent_id, original.parent_id);
        assert_eq!(restored.title, original.title);
        assert_eq!(restored.url, original.url);
        assert_eq!(restored.style, original.style);
        assert_eq!(restored.index, original.index);
        assert!(check_forest(&forest).is_ok());

        let entry = log.get(&entry_id).unwrap();
        assert!(entry.disabled_undo);
        assert!(!entry.disabled_redo);
    }

    #[test]
    fn test_undo_twice_is_rejected() {
        let mut forest = sample_forest();
        let mut log = UndoLog::default();
        let entry_id = log_delete(&mut forest, &mut log, "B2");

        log.undo(&mut forest, &entry_id).unwrap();
        assert!(matches!(log.undo(&mut forest, &entry_id), Err(TreeError::InvalidInput(_))));
        assert!(matches!(log.undo(&mut forest, "nope"), Err(TreeError::NotFound(_))));
    }

    #[test]
    fn test_redo_delete_removes_again() {
        let mut forest = sample_forest();
        let mut log = UndoLog::default();
        let entry_id = log_delete(&mut forest, &mut log, "F2");

        assert!(matches!(log.redo(&mut forest, &entry_id), Err(TreeError::InvalidInput(_))));
        log.undo(&mut forest, &entry_id).unwrap();
        assert!(find_node(&forest, "B3").is_some());

        log.redo(&mut forest, &entry_id).unwrap();
        assert!(find_node(&forest, "F2").is_none());
        let entry = log.get(&entry_id).unwrap();
        assert!(entry.can_undo());
        assert!(!entry.can_redo());
    }

    #[test]
    fn test_undo_and_redo_move() {
        let mut forest = sample_forest();
        let before = child_ids(&forest, "F1");
        let mut log = UndoLog::default();

        let snapshot = find_node(&forest, "B1").unwrap().clone();
        let relocation = ops::move_item(&mut forest, "F1", ops::DropPosition::Into, "B1", "F2").unwrap();
        let entry = UndoEntry::moved(snapshot, &relocation);
        let entry_id = entry.id.clone();
        log.add_action(entry);

        log.undo(&mut forest, &entry_id).unwrap();
        assert_eq!(child_ids(&forest, "F1"), before);

        log.redo(&mut forest, &entry_id).unwrap();
        assert_eq!(child_ids(&forest, "F2"), vec!["B3", "B1"]);
        assert!(check_forest(&forest).is_ok());
    }

    #[test]
    fn test_undo_and_redo_duplicate() {
        let mut forest = sample_forest();
        let mut log = UndoLog::default();

        let copy_id = ops::copy(&mut forest, "F2", "root", &IdGenerator::default()).unwrap();
        let copy = find_node(&forest, &copy_id).unwrap().clone();
        let index = copy.index as usize;
        let entry = UndoEntry::duplicated(copy, "F1".to_string(), index);
        let entry_id = entry.id.clone();
        log.add_action(entry);

        log.undo(&mut forest, &entry_id).unwrap();
        assert!(find_node(&forest, &copy_id).is_none());
        assert!(find_node(&forest, "F2").is_some());

        log.redo(&mut forest, &entry_id).unwrap();
        assert_eq!(find_node(&forest, &copy_id).unwrap().parent_id, "root");
        assert!(check_forest(&forest).is_ok());
    }

    #[test]
    fn test_redo_delete_keeps_later_changes_for_next_undo() {
        let mut forest = sample_forest();
        let mut log = UndoLog::default();
        let ids = IdGenerator::default();
        let entry_id = log_delete(&mut forest, &mut log, "F2");

        log.undo(&mut forest, &entry_id).unwrap();
        let added = ops::create_node(&mut forest, "F2", ops::NewNode::bookmark("New", "https://new.example"), &ids).unwrap();
        ops::edit_node(
            &mut forest,
            "B3",
            ops::NodeEdit {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        log.redo(&mut forest, &entry_id).unwrap();
        assert!(find_node(&forest, &added).is_none());

        log.undo(&mut forest, &entry_id).unwrap();
        assert_eq!(find_node(&forest, &added).unwrap().parent_id, "F2");
        assert_eq!(find_node(&forest, "B3").unwrap().title, "Renamed");
        assert_eq!(child_ids(&forest, "F2"), vec!["B3".to_string(), added]);
        assert!(check_forest(&forest).is_ok());
    }

    #[test]
    fn test_redo_duplicate_keeps_edits_made_to_copy() {
        let mut forest = sample_forest();
        let mut log = UndoLog::default();

        let copy_id = ops::copy(&mut forest, "B1", "F2", &IdGenerator::default()).unwrap();
        let copy = find_node(&forest, &copy_id).unwrap().clone();
        let index = copy.index as usize;
        let entry = UndoEntry::duplicated(copy, "F1".to_string(), index);
        let entry_id = entry.id.clone();
        log.add_action(entry);

        ops::edit_node(
            &mut forest,
            &copy_id,
            ops::NodeEdit {
                title: Some("Edited copy".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        log.undo(&mut forest, &entry_id).unwrap();
        assert!(find_node(&forest, &copy_id).is_none());

        log.redo(&mut forest, &entry_id).unwrap();
        let restored = find_node(&forest, &copy_id).unwrap();
        assert_eq!(restored.title, "Edited copy");
        assert_eq!(restored.parent_id, "F2");
    }

    #[test]
    fn test_entries_are_independent() {
        let mut forest = sample_forest();
        let mut log = UndoLog::default();
        let first = log_delete(&mut forest, &mut log, "B1");
        let second = log_delete(&mut forest, &mut log, "B4");

        // Older entry first, newer one stays undoable.
        log.undo(&mut forest, &first).unwrap();
        assert!(log.get(&second).unwrap().can_undo());
        assert_eq!(log.latest_undoable().unwrap().id, second);
        assert_eq!(log.latest_redoable().unwrap().id, first);

        log.undo(&mut forest, &second).unwrap();
        assert!(find_node(&forest, "B1").is_some());
        assert!(find_node(&forest, "B4").is_some());
        assert!(log.latest_undoable().is_none());
    }

    #[test]
    fn test_failed_undo_keeps_flags_and_forest() {
        let mut forest = sample_forest();
        let mut log = UndoLog::default();
        let child = log_delete(&mut forest, &mut log, "B3");
        let _parent = log_delete(&mut forest, &mut log, "F2");
        let before = forest.clone();

        // F2 is gone, so B3 has nowhere to go back to.
        assert!(matches!(log.undo(&mut forest, &child), Err(TreeError::NotFound(_))));
        assert_eq!(forest, before);
        assert!(log.get(&child).unwrap().can_undo());
    }

    #[test]
    fn test_log_is_bounded_fifo() {
        let mut forest = sample_forest();
        let mut log = UndoLog::new(3);
        let mut ids = Vec::new();
        for _ in 0..6 {
            let copy_id = ops::copy(&mut forest, "B1", "root", &IdGenerator::default()).unwrap();
            ids.push(log_delete(&mut forest, &mut log, &copy_id));
            assert!(log.len() <= 3);
        }
        let kept: Vec<String> = log.entries.iter().map(|e| e.id.clone()).collect();
        assert_eq!(kept, ids[3..].to_vec());

        log.set_max_length(1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries[0].id, ids[5]);
    }

    #[test]
    fn test_entry_serializes_like_profile_record() {
        let mut forest = sample_forest();
        let removed = ops::delete(&mut forest, "B2").unwrap();
        let value = serde_json::to_value(UndoEntry::deleted(&removed)).unwrap();
        assert_eq!(value["type"], "deleted");
        assert_eq!(value["oldParentId"], "F1");
        assert_eq!(value["disabledUndo"], false);
        assert_eq!(value["disabledRedo"], true);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::tree::fixtures::sample_forest;
    use crate::ops;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_log_never_exceeds_max_length(max in 1usize..8, actions in 0usize..30) {
            let mut forest = sample_forest();
            let removed = ops::delete(&mut forest, "B1").unwrap();
            let mut log = UndoLog::new(max);
            let mut ids = Vec::new();
            for _ in 0..actions {
                let entry = UndoEntry::deleted(&removed);
                ids.push(entry.id.clone());
                log.add_action(entry);
                prop_assert!(log.len() <= max);
            }
            let expected: Vec<String> = ids.iter().rev().take(max).rev().cloned().collect();
            let kept: Vec<String> = log.entries.iter().map(|e| e.id.clone()).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
