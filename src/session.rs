//! Application state for one user session.
//!
//! The session owns the active profile, the folder being viewed and the
//! clipboard. Every mutation goes through [`Session::transact`], which works
//! on a staged copy of the profile and only commits it once the store has
//! accepted the write.

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{TreeError, TreeResult};
use crate::node::{Node, NodeType, Style, ROOT_ID};
use crate::ops::{self, DropPosition, NewNode, NodeEdit, Relocation};
use crate::profile::{profile_key, ProfileManager, UserProfile};
use crate::store::KeyValueStore;
use crate::tree::{self, SearchKey};
use crate::undo::UndoEntry;
use crate::validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardMode {
    Copy,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clipboard {
    pub node_id: String,
    pub mode: ClipboardMode,
}

pub struct Session<S: KeyValueStore> {
    profiles: ProfileManager<S>,
    profile: UserProfile,
    current_folder_id: String,
    clipboard: Option<Clipboard>,
}

impl<S: KeyValueStore> Session<S> {
    /// Open the active profile of `store`, creating one on first use.
    pub async fn open(store: S) -> anyhow::Result<Self> {
        let mut profiles = ProfileManager::new(store);
        let profile = profiles.load_active().await?;
        let mut session = Self {
            profiles,
            profile,
            current_folder_id: ROOT_ID.to_string(),
            clipboard: None,
        };
        session.reset_view();
        info!("📂 Session opened for profile '{}'", session.profile.name);
        Ok(session)
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn forest(&self) -> &[Node] {
        self.profile.forest()
    }

    pub fn current_folder_id(&self) -> &str {
        &self.current_folder_id
    }

    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    pub fn profiles(&mut self) -> &mut ProfileManager<S> {
        &mut self.profiles
    }

    /// Replace the whole session state with another profile's.
    pub async fn switch_profile(&mut self, name: &str) -> anyhow::Result<()> {
        self.profile = self.profiles.switch(name).await?;
        self.clipboard = None;
        self.reset_view();
        Ok(())
    }

    fn reset_view(&mut self) {
        let start = self.profile.main_user_settings.start_folder.clone();
        let usable = tree::require_folder(self.forest(), &start).is_ok();
        self.current_folder_id = if usable { start } else { ROOT_ID.to_string() };
    }

    pub fn open_folder(&mut self, id: &str) -> TreeResult<()> {
        tree::require_folder(self.forest(), id)?;
        self.current_folder_id = id.to_string();
        Ok(())
    }

    fn target_folder(&self, parent: Option<&str>) -> String {
        parent.unwrap_or(&self.current_folder_id).to_string()
    }

    /// Run `mutate` against a staged copy of the profile and persist it.
    ///
    /// On any error, from the mutation or from the store, the live profile
    /// is left as it was.
    async fn transact<T, F>(&mut self, action: &str, mutate: F) -> TreeResult<T>
    where
        F: FnOnce(&mut UserProfile) -> TreeResult<(T, Value)>,
    {
        let mut staged = self.profile.clone();
        let (output, payload) = mutate(&mut staged)?;
        tree::normalize(&mut staged.current_user_bookmarks);

        let report = validator::check_forest(&staged.current_user_bookmarks);
        if let Some(first) = report.violations.first() {
            warn!("⚠️  {} would leave {} tree violation(s), nothing saved", action, report.violations.len());
            return Err(TreeError::invalid(format!("{} rejected: {}", action, first)));
        }

        let limit = staged.main_user_settings.max_activity_entries;
        staged.user_activity_log.record(action, payload, limit);

        let value = serde_json::to_value(&staged).map_err(|e| TreeError::Persistence(e.to_string()))?;
        if let Err(e) = self.profiles.store_mut().save(&profile_key(&staged.user_id), value).await {
            error!("❌ Failed to save profile '{}': {:#}", staged.name, e);
            return Err(TreeError::Persistence(e.to_string()));
        }

        self.profile = staged;
        if tree::require_folder(self.forest(), &self.current_folder_id).is_err() {
            self.current_folder_id = ROOT_ID.to_string();
        }
        Ok(output)
    }

    pub async fn create_folder(&mut self, parent: Option<&str>, title: &str) -> TreeResult<String> {
        let parent = self.target_folder(parent);
        let mut new = NewNode::folder(title);
        new.style = Some(Style::Folder(self.profile.default_user_folder_style.clone()));

        self.transact("create", move |p| {
            let ids = p.main_user_settings.id_generator();
            let id = ops::create_node(&mut p.current_user_bookmarks, &parent, new, &ids)?;
            Ok((id.clone(), json!({ "id": id, "type": NodeType::Folder.name(), "parentId": parent })))
        })
        .await
    }

    pub async fn create_bookmark(&mut self, parent: Option<&str>, title: &str, url: &str) -> TreeResult<String> {
        let parent = self.target_folder(parent);
        if self.profile.main_user_settings.warn_duplicate_urls {
            if let Some(existing) = tree::find_by_key(self.forest(), url, SearchKey::Url) {
                warn!("⚠️  {} is already bookmarked as '{}' [{}]", url, existing.title, existing.id);
            }
        }
        let mut new = NewNode::bookmark(title, url);
        new.style = Some(Style::Bookmark(self.profile.default_user_bookmark_style.clone()));

        self.transact("create", move |p| {
            let ids = p.main_user_settings.id_generator();
            let id = ops::create_node(&mut p.current_user_bookmarks, &parent, new, &ids)?;
            Ok((id.clone(), json!({ "id": id, "type": NodeType::Bookmark.name(), "parentId": parent })))
        })
        .await
    }

    pub async fn edit(&mut self, id: &str, edit: NodeEdit) -> TreeResult<()> {
        let id = id.to_string();
        self.transact("edit", move |p| {
            let previous = ops::edit_node(&mut p.current_user_bookmarks, &id, edit)?;
            Ok(((), json!({ "id": id, "previousTitle": previous.title })))
        })
        .await
    }

    pub fn copy_to_clipboard(&mut self, id: &str) -> TreeResult<()> {
        self.put_on_clipboard(id, ClipboardMode::Copy)
    }

    pub fn cut_to_clipboard(&mut self, id: &str) -> TreeResult<()> {
        self.put_on_clipboard(id, ClipboardMode::Cut)
    }

    fn put_on_clipboard(&mut self, id: &str, mode: ClipboardMode) -> TreeResult<()> {
        let node = tree::find_node(self.forest(), id).ok_or_else(|| TreeError::not_found(format!("node '{}'", id)))?;
        if node.is_root() {
            return Err(TreeError::invalid("the root folder cannot be copied or cut"));
        }
        self.clipboard = Some(Clipboard {
            node_id: id.to_string(),
            mode,
        });
        Ok(())
    }

    /// Paste the clipboard into `target` (default: current folder). Returns
    /// the id of the pasted node, which is new for a copy and unchanged for
    /// a cut. A cut empties the clipboard.
    pub async fn paste(&mut self, target: Option<&str>) -> TreeResult<String> {
        let clipboard = self
            .clipboard
            .clone()
            .ok_or_else(|| TreeError::invalid("the clipboard is empty"))?;
        let target = self.target_folder(target);

        let pasted = match clipboard.mode {
            ClipboardMode::Copy => self.duplicate(&clipboard.node_id, &target).await?,
            ClipboardMode::Cut => {
                self.relocate("cut", &clipboard.node_id, move |forest, id| ops::cut(forest, id, &target))
                    .await?;
                clipboard.node_id.clone()
            }
        };

        if clipboard.mode == ClipboardMode::Cut {
            self.clipboard = None;
        }
        Ok(pasted)
    }

    async fn duplicate(&mut self, node_id: &str, target: &str) -> TreeResult<String> {
        let node_id = node_id.to_string();
        let target = target.to_string();
        self.transact("copy", move |p| {
            let ids = p.main_user_settings.id_generator();
            let source_parent = ops::locate(&p.current_user_bookmarks, &node_id)
                .map(|(parent, _)| parent)
                .unwrap_or_default();
            let new_id = ops::copy(&mut p.current_user_bookmarks, &node_id, &target, &ids)?;
            let copy = tree::find_node(&p.current_user_bookmarks, &new_id)
                .cloned()
                .ok_or_else(|| TreeError::not_found(format!("node '{}'", new_id)))?;
            let index = usize::try_from(copy.index).unwrap_or_default();
            p.user_undo_log.add_action(UndoEntry::duplicated(copy, source_parent, index));
            Ok((new_id.clone(), json!({ "source": node_id, "id": new_id, "parentId": target })))
        })
        .await
    }

    async fn relocate<F>(&mut self, action: &str, node_id: &str, apply: F) -> TreeResult<Relocation>
    where
        F: FnOnce(&mut [Node], &str) -> TreeResult<Relocation>,
    {
        let node_id = node_id.to_string();
        self.transact(action, move |p| {
            let snapshot = tree::find_node(&p.current_user_bookmarks, &node_id)
                .cloned()
                .ok_or_else(|| TreeError::not_found(format!("node '{}'", node_id)))?;
            let relocation = apply(&mut p.current_user_bookmarks, &node_id)?;
            if relocation.old_parent_id != relocation.new_parent_id || relocation.old_index != relocation.new_index {
                p.user_undo_log.add_action(UndoEntry::moved(snapshot, &relocation));
            }
            let payload = json!({
                "id": node_id,
                "from": relocation.old_parent_id,
                "to": relocation.new_parent_id,
                "index": relocation.new_index,
            });
            Ok((relocation, payload))
        })
        .await
    }

    /// Drag-and-drop move of `from_id` relative to `to_id` inside `parent_id`.
    pub async fn move_item(
        &mut self,
        parent_id: &str,
        position: DropPosition,
        from_id: &str,
        to_id: &str,
    ) -> TreeResult<Relocation> {
        let parent_id = parent_id.to_string();
        let to_id = to_id.to_string();
        self.relocate("move", from_id, move |forest, id| {
            ops::move_item(forest, &parent_id, position, id, &to_id)
        })
        .await
    }

    /// Remove a node and its subtree. Returns the undo log entry id.
    pub async fn delete(&mut self, id: &str) -> TreeResult<String> {
        let id = id.to_string();
        let entry_id = self
            .transact("delete", move |p| {
                let removed = ops::delete(&mut p.current_user_bookmarks, &id)?;
                let entry = UndoEntry::deleted(&removed);
                let entry_id = entry.id.clone();
                let payload = json!({
                    "id": id,
                    "title": removed.node.title,
                    "parentId": removed.parent_id,
                    "entry": entry_id,
                });
                p.user_undo_log.add_action(entry);
                Ok((entry_id, payload))
            })
            .await?;

        if self.clipboard.as_ref().is_some_and(|c| !tree::contains_id(self.forest(), &c.node_id)) {
            self.clipboard = None;
        }
        Ok(entry_id)
    }

    /// Undo `entry_id`, or the newest undoable entry.
    pub async fn undo(&mut self, entry_id: Option<&str>) -> TreeResult<UndoEntry> {
        let entry_id = match entry_id {
            Some(id) => id.to_string(),
            None => self
                .profile
                .user_undo_log
                .latest_undoable()
                .map(|e| e.id.clone())
                .ok_or_else(|| TreeError::not_found("nothing to undo"))?,
        };

        self.transact("undo", move |p| {
            p.user_undo_log.undo(&mut p.current_user_bookmarks, &entry_id)?;
            let entry = p
                .user_undo_log
                .get(&entry_id)
                .cloned()
                .ok_or_else(|| TreeError::not_found(format!("log entry '{}'", entry_id)))?;
            let payload = json!({ "entry": entry_id, "type": entry.kind.name(), "id": entry.item.id });
            Ok((entry, payload))
        })
        .await
    }

    /// Redo `entry_id`, or the newest redoable entry.
    pub async fn redo(&mut self, entry_id: Option<&str>) -> TreeResult<UndoEntry> {
        let entry_id = match entry_id {
            Some(id) => id.to_string(),
            None => self
                .profile
                .user_undo_log
                .latest_redoable()
                .map(|e| e.id.clone())
                .ok_or_else(|| TreeError::not_found("nothing to redo"))?,
        };

        self.transact("redo", move |p| {
            p.user_undo_log.redo(&mut p.current_user_bookmarks, &entry_id)?;
            let entry = p
                .user_undo_log
                .get(&entry_id)
                .cloned()
                .ok_or_else(|| TreeError::not_found(format!("log entry '{}'", entry_id)))?;
            let payload = json!({ "entry": entry_id, "type": entry.kind.name(), "id": entry.item.id });
            Ok((entry, payload))
        })
        .await
    }

    /// Merge an imported node set into `target` with fresh ids.
    pub async fn import(&mut self, nodes: Vec<Node>, target: Option<&str>) -> TreeResult<Vec<String>> {
        let target = self.target_folder(target);
        let count = tree::count_nodes(&nodes);
        self.transact("import", move |p| {
            let ids = p.main_user_settings.id_generator();
            let new_ids = ops::import_forest(&mut p.current_user_bookmarks, nodes, &target, &ids)?;
            Ok((new_ids, json!({ "parentId": target, "nodes": count })))
        })
        .await
    }

    /// Change one setting and persist it.
    pub async fn update_setting(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut settings = self.profile.main_user_settings.clone();
        settings.set(key, value)?;

        let key = key.to_string();
        let value = value.to_string();
        self.transact("settings", move |p| {
            p.user_undo_log.set_max_length(settings.max_undo_entries);
            p.main_user_settings = settings;
            Ok(((), json!({ "key": key, "value": value })))
        })
        .await?;
        Ok(())
    }
}
