//! Read-side helpers over the forest: lookup, index bookkeeping, traversal.

use regex::Regex;
use std::collections::HashSet;

use crate::error::{TreeError, TreeResult};
use crate::node::Node;

/// Field compared by [`find_by_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchKey {
    #[default]
    Id,
    Url,
    Title,
    ParentId,
}

impl SearchKey {
    fn value<'a>(&self, node: &'a Node) -> Option<&'a str> {
        match self {
            SearchKey::Id => Some(&node.id),
            SearchKey::Url => node.url.as_deref(),
            SearchKey::Title => Some(&node.title),
            SearchKey::ParentId => Some(&node.parent_id),
        }
    }
}

/// Find the first node whose `key` equals `value`.
///
/// Each sibling list is checked in full before descending into the children
/// of its members, so a shallow match wins over a deeper one.
pub fn find_by_key<'a>(forest: &'a [Node], value: &str, key: SearchKey) -> Option<&'a Node> {
    if let Some(hit) = forest.iter().find(|n| key.value(n) == Some(value)) {
        return Some(hit);
    }
    forest
        .iter()
        .find_map(|n| find_by_key(&n.children, value, key))
}

pub fn find_node<'a>(forest: &'a [Node], id: &str) -> Option<&'a Node> {
    find_by_key(forest, id, SearchKey::Id)
}

pub fn find_node_mut<'a>(forest: &'a mut [Node], id: &str) -> Option<&'a mut Node> {
    if let Some(pos) = forest.iter().position(|n| n.id == id) {
        return Some(&mut forest[pos]);
    }
    for node in forest.iter_mut() {
        if let Some(found) = find_node_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

pub fn contains_id(forest: &[Node], id: &str) -> bool {
    find_node(forest, id).is_some()
}

/// Look up a node that must be a folder.
pub fn require_folder<'a>(forest: &'a [Node], id: &str) -> TreeResult<&'a Node> {
    let node = find_node(forest, id).ok_or_else(|| TreeError::not_found(format!("folder '{}'", id)))?;
    if !node.is_folder() {
        return Err(TreeError::invalid(format!("'{}' is a bookmark, not a folder", id)));
    }
    Ok(node)
}

/// `max(index) + 1` over a sibling list, `0` when empty.
pub fn next_max_index(siblings: &[Node]) -> i64 {
    siblings.iter().map(|n| n.index).max().map_or(0, |max| max + 1)
}

/// Next free index inside the folder `parent_id`.
pub fn next_index_in(forest: &[Node], parent_id: &str) -> TreeResult<i64> {
    let parent = require_folder(forest, parent_id)?;
    Ok(next_max_index(&parent.children))
}

/// Rewrite every sibling list's `index` to its position (0..n-1).
pub fn correct_indexes(forest: &mut [Node]) {
    for (pos, node) in forest.iter_mut().enumerate() {
        node.index = pos as i64;
        correct_indexes(&mut node.children);
    }
}

/// Rewrite `count` to the number of direct children.
pub fn refresh_counts(forest: &mut [Node]) {
    for node in forest.iter_mut() {
        refresh_counts(&mut node.children);
        node.count = node.children.len();
    }
}

/// Restore dense indexes and counts after a structural change.
pub fn normalize(forest: &mut [Node]) {
    correct_indexes(forest);
    refresh_counts(forest);
}

/// True when `id` is `ancestor_id` itself or lies somewhere below it.
pub fn is_in_subtree(forest: &[Node], ancestor_id: &str, id: &str) -> bool {
    match find_node(forest, ancestor_id) {
        Some(ancestor) => ancestor.id == id || contains_id(&ancestor.children, id),
        None => false,
    }
}

pub fn collect_ids(forest: &[Node], out: &mut HashSet<String>) {
    for node in forest {
        out.insert(node.id.clone());
        collect_ids(&node.children, out);
    }
}

pub fn all_ids(forest: &[Node]) -> HashSet<String> {
    let mut ids = HashSet::new();
    collect_ids(forest, &mut ids);
    ids
}

pub fn count_nodes(forest: &[Node]) -> usize {
    forest.iter().map(Node::subtree_size).sum()
}

/// Every node whose title or url matches `pattern`, shallow matches first.
pub fn search<'a>(forest: &'a [Node], pattern: &Regex) -> Vec<&'a Node> {
    let mut hits = Vec::new();
    search_into(forest, pattern, &mut hits);
    hits
}

fn search_into<'a>(forest: &'a [Node], pattern: &Regex, hits: &mut Vec<&'a Node>) {
    for node in forest {
        let url_match = node.url.as_deref().is_some_and(|u| pattern.is_match(u));
        if pattern.is_match(&node.title) || url_match {
            hits.push(node);
        }
    }
    for node in forest {
        search_into(&node.children, pattern, hits);
    }
}

/// Titles from the root down to `id`, e.g. `Bookmarks/Work/Rust`.
pub fn path_of(forest: &[Node], id: &str) -> Option<String> {
    fn walk(nodes: &[Node], id: &str, trail: &mut Vec<String>) -> bool {
        for node in nodes {
            trail.push(node.title.clone());
            if node.id == id || walk(&node.children, id, trail) {
                return true;
            }
            trail.pop();
        }
        false
    }

    let mut trail = Vec::new();
    walk(forest, id, &mut trail).then(|| trail.join("/"))
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_forest;
    use super::*;

    #[test]
    fn test_find_by_id() {
        let forest = sample_forest();
        assert_eq!(find_node(&forest, "B3").map(|n| n.title.as_str()), Some("Docs"));
        assert!(find_node(&forest, "missing").is_none());
    }

    #[test]
    fn test_find_by_url() {
        let forest = sample_forest();
        let hit = find_by_key(&forest, "https://crates.io", SearchKey::Url).unwrap();
        assert_eq!(hit.id, "B2");
    }

    #[test]
    fn test_find_prefers_shallow_match() {
        let mut forest = sample_forest();
        // Same title deeper down and at the top level.
        find_node_mut(&mut forest, "B3").unwrap().title = "News".to_string();
        let hit = find_by_key(&forest, "News", SearchKey::Title).unwrap();
        assert_eq!(hit.id, "B4");
    }

    #[test]
    fn test_next_max_index_empty_is_zero() {
        let forest = vec![Node::root()];
        assert_eq!(next_max_index(&forest[0].children), 0);
        assert_eq!(next_index_in(&forest, "root").unwrap(), 0);
    }

    #[test]
    fn test_next_max_index_uses_max_not_len() {
        let mut siblings = vec![
            Node::bookmark("a", "root", "A", "https://a.example"),
            Node::bookmark("b", "root", "B", "https://b.example"),
        ];
        siblings[0].index = 7;
        siblings[1].index = 2;
        assert_eq!(next_max_index(&siblings), 8);
    }

    #[test]
    fn test_next_index_in_bookmark_is_invalid() {
        let forest = sample_forest();
        assert!(matches!(next_index_in(&forest, "B1"), Err(TreeError::InvalidInput(_))));
        assert!(matches!(next_index_in(&forest, "nope"), Err(TreeError::NotFound(_))));
    }

    #[test]
    fn test_correct_indexes_is_dense() {
        let mut forest = sample_forest();
        let f1 = find_node_mut(&mut forest, "F1").unwrap();
        f1.children[0].index = 5;
        f1.children[1].index = 5;
        f1.children[2].index = -1;
        correct_indexes(&mut forest);

        let f1 = find_node(&forest, "F1").unwrap();
        let indexes: Vec<i64> = f1.children.iter().map(|n| n.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_refresh_counts() {
        let forest = sample_forest();
        assert_eq!(find_node(&forest, "root").unwrap().count, 2);
        assert_eq!(find_node(&forest, "F1").unwrap().count, 3);
        assert_eq!(find_node(&forest, "B1").unwrap().count, 0);
    }

    #[test]
    fn test_is_in_subtree() {
        let forest = sample_forest();
        assert!(is_in_subtree(&forest, "F1", "F1"));
        assert!(is_in_subtree(&forest, "F1", "B3"));
        assert!(!is_in_subtree(&forest, "F2", "B1"));
        assert!(!is_in_subtree(&forest, "missing", "B1"));
    }

    #[test]
    fn test_search_matches_title_and_url() {
        let forest = sample_forest();
        let pattern = Regex::new("(?i)rust").unwrap();
        let ids: Vec<&str> = search(&forest, &pattern).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["F2", "B3"]);
    }

    #[test]
    fn test_path_of() {
        let forest = sample_forest();
        assert_eq!(path_of(&forest, "B3").as_deref(), Some("Bookmarks/Work/Rust/Docs"));
        assert_eq!(path_of(&forest, "missing"), None);
    }

    #[test]
    fn test_all_ids_and_count() {
        let forest = sample_forest();
        assert_eq!(all_ids(&forest).len(), 7);
        assert_eq!(count_nodes(&forest), 7);
    }
}
