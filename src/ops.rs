//! Structural mutations of the forest.
//!
//! Every operation validates first and mutates second: an `Err` return means
//! the forest was not touched. A successful return leaves indexes dense and
//! folder counts current.

use std::collections::HashSet;
use tracing::debug;

use crate::error::{TreeError, TreeResult};
use crate::id_gen::IdGenerator;
use crate::node::{now_millis, Node, NodeType, Style};
use crate::tree::{self, find_node, find_node_mut, require_folder};

/// Where a dragged node lands relative to the drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    Before,
    After,
    /// Appended to the target folder's children.
    Into,
}

#[derive(Debug, Clone)]
pub struct NewNode {
    pub node_type: NodeType,
    pub title: String,
    pub url: Option<String>,
    pub style: Option<Style>,
}

impl NewNode {
    pub fn folder(title: &str) -> Self {
        Self {
            node_type: NodeType::Folder,
            title: title.to_string(),
            url: None,
            style: None,
        }
    }

    pub fn bookmark(title: &str, url: &str) -> Self {
        Self {
            node_type: NodeType::Bookmark,
            title: title.to_string(),
            url: Some(url.to_string()),
            style: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeEdit {
    pub title: Option<String>,
    pub url: Option<String>,
    pub style: Option<Style>,
}

/// Where a node was and where it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub node_id: String,
    pub old_parent_id: String,
    pub old_index: usize,
    pub new_parent_id: String,
    pub new_index: usize,
}

/// A subtree taken out of the forest, with its former position.
#[derive(Debug, Clone)]
pub struct Removed {
    pub node: Node,
    pub parent_id: String,
    pub index: usize,
}

#[derive(Clone, Copy)]
enum Placement<'a> {
    End,
    At(usize),
    Before(&'a str),
    After(&'a str),
}

/// Parent id and position of `id` inside its parent's children.
pub fn locate(forest: &[Node], id: &str) -> Option<(String, usize)> {
    for node in forest {
        if let Some(pos) = node.children.iter().position(|c| c.id == id) {
            return Some((node.id.clone(), pos));
        }
        if let Some(found) = locate(&node.children, id) {
            return Some(found);
        }
    }
    None
}

fn detach(forest: &mut [Node], id: &str) -> Option<Removed> {
    for node in forest.iter_mut() {
        if let Some(pos) = node.children.iter().position(|c| c.id == id) {
            let child = node.children.remove(pos);
            node.date_group_modified = now_millis();
            return Some(Removed {
                node: child,
                parent_id: node.id.clone(),
                index: pos,
            });
        }
        if let Some(found) = detach(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Insert `node` into folder `parent_id`. Returns the position it landed at.
fn attach(forest: &mut [Node], parent_id: &str, mut node: Node, placement: Placement) -> Result<usize, Node> {
    let Some(parent) = find_node_mut(forest, parent_id).filter(|p| p.is_folder()) else {
        return Err(node);
    };
    let len = parent.children.len();
    let pos = match placement {
        Placement::End => len,
        Placement::At(pos) => pos.min(len),
        Placement::Before(target) | Placement::After(target) => {
            let Some(target_pos) = parent.children.iter().position(|c| c.id == target) else {
                return Err(node);
            };
            if matches!(placement, Placement::After(_)) {
                target_pos + 1
            } else {
                target_pos
            }
        }
    };
    node.parent_id = parent.id.clone();
    parent.children.insert(pos, node);
    parent.date_group_modified = now_millis();
    Ok(pos)
}

fn require_movable<'a>(forest: &'a [Node], id: &str) -> TreeResult<&'a Node> {
    let node = find_node(forest, id).ok_or_else(|| TreeError::not_found(format!("node '{}'", id)))?;
    if node.is_root() {
        return Err(TreeError::invalid("the root folder cannot be moved, copied or removed"));
    }
    Ok(node)
}

fn ensure_acyclic(forest: &[Node], node_id: &str, target_id: &str) -> TreeResult<()> {
    if tree::is_in_subtree(forest, node_id, target_id) {
        return Err(TreeError::CycleViolation {
            node: node_id.to_string(),
            target: target_id.to_string(),
        });
    }
    Ok(())
}

/// Detach `node_id` and attach it under `new_parent_id`. All checks run
/// before the detach; should the attach still fail the node goes back to
/// where it was.
fn relocate(forest: &mut [Node], node_id: &str, new_parent_id: &str, placement: Placement) -> TreeResult<Relocation> {
    require_movable(forest, node_id)?;
    require_folder(forest, new_parent_id)?;
    ensure_acyclic(forest, node_id, new_parent_id)?;

    let removed = detach(forest, node_id).ok_or_else(|| TreeError::not_found(format!("parent of '{}'", node_id)))?;
    let Removed { node, parent_id: old_parent_id, index: old_index } = removed;

    match attach(forest, new_parent_id, node, placement) {
        Ok(new_index) => {
            tree::normalize(forest);
            debug!(
                "📦 Moved {} from {}[{}] to {}[{}]",
                node_id, old_parent_id, old_index, new_parent_id, new_index
            );
            Ok(Relocation {
                node_id: node_id.to_string(),
                old_parent_id,
                old_index,
                new_parent_id: new_parent_id.to_string(),
                new_index,
            })
        }
        Err(node) => {
            let lost = attach(forest, &old_parent_id, node, Placement::At(old_index)).is_err();
            debug_assert!(!lost, "old parent vanished while relocating {}", node_id);
            if lost {
                return Err(TreeError::invalid(format!(
                    "'{}' could not be put back into '{}'",
                    node_id, old_parent_id
                )));
            }
            tree::normalize(forest);
            Err(TreeError::not_found(format!("drop target in '{}'", new_parent_id)))
        }
    }
}

/// Append a new folder or bookmark to `parent_id`. Returns the new id.
pub fn create_node(forest: &mut [Node], parent_id: &str, new: NewNode, ids: &IdGenerator) -> TreeResult<String> {
    validate_shape(new.node_type, new.url.as_deref(), new.style.as_ref())?;
    let index = tree::next_index_in(forest, parent_id)?;
    let id = ids.generate_for(forest)?;

    let mut node = match new.node_type {
        NodeType::Folder => Node::folder(&id, parent_id, &new.title),
        NodeType::Bookmark => Node::bookmark(&id, parent_id, &new.title, new.url.as_deref().unwrap_or_default()),
    };
    node.index = index;
    if let Some(style) = new.style {
        node.style = style;
    }

    attach(forest, parent_id, node, Placement::End)
        .map_err(|_| TreeError::not_found(format!("folder '{}'", parent_id)))?;
    tree::normalize(forest);
    Ok(id)
}

fn validate_shape(node_type: NodeType, url: Option<&str>, style: Option<&Style>) -> TreeResult<()> {
    match (node_type, url) {
        (NodeType::Bookmark, None) => return Err(TreeError::invalid("a bookmark needs a url")),
        (NodeType::Bookmark, Some(u)) if u.trim().is_empty() => {
            return Err(TreeError::invalid("a bookmark needs a url"))
        }
        (NodeType::Folder, Some(_)) => return Err(TreeError::invalid("a folder cannot have a url")),
        _ => {}
    }
    if let Some(style) = style {
        if !style.matches(node_type) {
            return Err(TreeError::invalid(format!("style does not fit a {}", node_type.name())));
        }
    }
    Ok(())
}

/// Change title, url or style of a node. Returns the node as it was.
pub fn edit_node(forest: &mut [Node], id: &str, edit: NodeEdit) -> TreeResult<Node> {
    let current = find_node(forest, id).ok_or_else(|| TreeError::not_found(format!("node '{}'", id)))?;
    if current.is_root() {
        return Err(TreeError::invalid("the root folder cannot be edited"));
    }
    let url = edit.url.as_deref().or(current.url.as_deref());
    validate_shape(current.node_type, url, edit.style.as_ref())?;

    let node = find_node_mut(forest, id).ok_or_else(|| TreeError::not_found(format!("node '{}'", id)))?;
    let previous = node.clone();
    if let Some(title) = edit.title {
        node.title = title;
    }
    if let Some(url) = edit.url {
        node.url = Some(url);
    }
    if let Some(style) = edit.style {
        node.style = style;
    }
    node.last_edited = now_millis();
    Ok(previous)
}

/// Re-parent `node_id` (with its subtree, ids unchanged) to the end of
/// `new_parent_id`.
pub fn cut(forest: &mut [Node], node_id: &str, new_parent_id: &str) -> TreeResult<Relocation> {
    relocate(forest, node_id, new_parent_id, Placement::End)
}

/// Move `node_id` into `parent_id` at `index` (clamped). Used to replay or
/// revert a recorded move.
pub fn move_to_index(forest: &mut [Node], node_id: &str, parent_id: &str, index: usize) -> TreeResult<Relocation> {
    relocate(forest, node_id, parent_id, Placement::At(index))
}

/// Drag-and-drop reorder: put `from_id` before or after `to_id` (a child of
/// `parent_id`), or into folder `to_id`.
pub fn move_item(
    forest: &mut [Node],
    parent_id: &str,
    position: DropPosition,
    from_id: &str,
    to_id: &str,
) -> TreeResult<Relocation> {
    match locate(forest, to_id) {
        Some((actual_parent, _)) if actual_parent == parent_id => {}
        _ => return Err(TreeError::not_found(format!("'{}' in folder '{}'", to_id, parent_id))),
    }

    if from_id == to_id {
        require_movable(forest, from_id)?;
        let (parent, index) = locate(forest, from_id)
            .ok_or_else(|| TreeError::not_found(format!("node '{}'", from_id)))?;
        return Ok(Relocation {
            node_id: from_id.to_string(),
            old_parent_id: parent.clone(),
            old_index: index,
            new_parent_id: parent,
            new_index: index,
        });
    }

    match position {
        DropPosition::Before => relocate(forest, from_id, parent_id, Placement::Before(to_id)),
        DropPosition::After => relocate(forest, from_id, parent_id, Placement::After(to_id)),
        DropPosition::Into => relocate(forest, from_id, to_id, Placement::End),
    }
}

/// Deep-copy `node_id` under `new_parent_id`. Every copied node gets a fresh
/// id. Returns the id of the copy's root.
pub fn copy(forest: &mut [Node], node_id: &str, new_parent_id: &str, ids: &IdGenerator) -> TreeResult<String> {
    let source = require_movable(forest, node_id)?.clone();
    require_folder(forest, new_parent_id)?;

    let mut taken = tree::all_ids(forest);
    let mut clone = source;
    regenerate_ids(&mut clone, new_parent_id, ids, &mut taken, now_millis())?;
    let new_id = clone.id.clone();

    attach(forest, new_parent_id, clone, Placement::End)
        .map_err(|_| TreeError::not_found(format!("folder '{}'", new_parent_id)))?;
    tree::normalize(forest);
    debug!("📋 Copied {} into {} as {}", node_id, new_parent_id, new_id);
    Ok(new_id)
}

fn regenerate_ids(
    node: &mut Node,
    parent_id: &str,
    ids: &IdGenerator,
    taken: &mut HashSet<String>,
    stamp: i64,
) -> TreeResult<()> {
    node.id = ids.generate_unique(taken)?;
    node.parent_id = parent_id.to_string();
    node.date_added = stamp;
    node.last_edited = stamp;
    let own_id = node.id.clone();
    for child in node.children.iter_mut() {
        regenerate_ids(child, &own_id, ids, taken, stamp)?;
    }
    Ok(())
}

/// Take `node_id` and its subtree out of the forest.
pub fn delete(forest: &mut [Node], node_id: &str) -> TreeResult<Removed> {
    require_movable(forest, node_id)?;
    let removed = detach(forest, node_id).ok_or_else(|| TreeError::not_found(format!("parent of '{}'", node_id)))?;
    tree::normalize(forest);
    debug!("🗑️  Removed {} from {}[{}]", node_id, removed.parent_id, removed.index);
    Ok(removed)
}

/// Put a previously removed subtree back under `parent_id` at `index`
/// (clamped). Refuses if any of its ids is already in use.
pub fn restore(forest: &mut [Node], node: Node, parent_id: &str, index: usize) -> TreeResult<usize> {
    require_folder(forest, parent_id)?;
    let live = tree::all_ids(forest);
    let mut incoming = HashSet::new();
    tree::collect_ids(std::slice::from_ref(&node), &mut incoming);
    if let Some(clash) = incoming.iter().find(|id| live.contains(*id)) {
        return Err(TreeError::invalid(format!("id '{}' is already in use", clash)));
    }

    let pos = attach(forest, parent_id, node, Placement::At(index))
        .map_err(|_| TreeError::not_found(format!("folder '{}'", parent_id)))?;
    tree::normalize(forest);
    Ok(pos)
}

/// Give an imported node set fresh ids and hang its top level under
/// `new_parent_id`. A rooted set contributes its root's children.
pub fn change_ids(
    nodes: Vec<Node>,
    new_parent_id: &str,
    ids: &IdGenerator,
    taken: &mut HashSet<String>,
) -> TreeResult<Vec<Node>> {
    let mut nodes = nodes;
    let mut top = if nodes.first().is_some_and(Node::is_root) {
        let root = nodes.remove(0);
        root.children.into_iter().chain(nodes).collect()
    } else {
        nodes
    };
    for node in &top {
        check_imported_shape(node)?;
    }
    let stamp = now_millis();
    for node in top.iter_mut() {
        regenerate_ids(node, new_parent_id, ids, taken, stamp)?;
    }
    Ok(top)
}

/// Imported nodes get the same shape rules as created ones, all the way down.
fn check_imported_shape(node: &Node) -> TreeResult<()> {
    validate_shape(node.node_type, node.url.as_deref(), Some(&node.style)).map_err(|e| match e {
        TreeError::InvalidInput(reason) => TreeError::invalid(format!("imported node '{}': {}", node.title, reason)),
        other => other,
    })?;
    if !node.is_folder() && !node.children.is_empty() {
        return Err(TreeError::invalid(format!("imported bookmark '{}' has children", node.title)));
    }
    node.children.iter().try_for_each(check_imported_shape)
}

/// Merge an imported node set into folder `target_id`. Returns the new ids
/// of the imported top-level nodes.
pub fn import_forest(
    forest: &mut [Node],
    nodes: Vec<Node>,
    target_id: &str,
    ids: &IdGenerator,
) -> TreeResult<Vec<String>> {
    require_folder(forest, target_id)?;
    let mut taken = tree::all_ids(forest);
    let rehomed = change_ids(nodes, target_id, ids, &mut taken)?;

    let parent = find_node_mut(forest, target_id).ok_or_else(|| TreeError::not_found(format!("folder '{}'", target_id)))?;
    let new_ids: Vec<String> = rehomed.iter().map(|n| n.id.clone()).collect();
    parent.children.extend(rehomed);
    parent.date_group_modified = now_millis();
    tree::normalize(forest);
    Ok(new_ids)
}
