use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::node::{Node, ROOT_ID};

/// A broken tree invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingRoot,
    RootNotFolder,
    ExtraTopLevel(String),
    DuplicateId(String),
    ParentMismatch { id: String, listed_under: String, parent_id: String },
    IndexNotDense { parent: String, indexes: Vec<i64> },
    CountMismatch { id: String, count: usize, children: usize },
    BookmarkWithoutUrl(String),
    BookmarkWithChildren(String),
    FolderWithUrl(String),
    StyleMismatch(String),
    BrokenParentChain(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingRoot => write!(f, "forest has no '{}' node at position 0", ROOT_ID),
            Violation::RootNotFolder => write!(f, "root node is not a folder"),
            Violation::ExtraTopLevel(id) => write!(f, "'{}' sits beside the root", id),
            Violation::DuplicateId(id) => write!(f, "id '{}' appears more than once", id),
            Violation::ParentMismatch { id, listed_under, parent_id } => write!(
                f,
                "'{}' is listed under '{}' but its parentId is '{}'",
                id, listed_under, parent_id
            ),
            Violation::IndexNotDense { parent, indexes } => {
                write!(f, "children of '{}' have indexes {:?}", parent, indexes)
            }
            Violation::CountMismatch { id, count, children } => {
                write!(f, "'{}' has count {} but {} children", id, count, children)
            }
            Violation::BookmarkWithoutUrl(id) => write!(f, "bookmark '{}' has no url", id),
            Violation::BookmarkWithChildren(id) => write!(f, "bookmark '{}' has children", id),
            Violation::FolderWithUrl(id) => write!(f, "folder '{}' has a url", id),
            Violation::StyleMismatch(id) => write!(f, "'{}' carries a style of the wrong kind", id),
            Violation::BrokenParentChain(id) => {
                write!(f, "following parentId from '{}' never reaches the root", id)
            }
        }
    }
}

/// Structural health of a forest.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub nodes_checked: usize,
    pub folders: usize,
    pub bookmarks: usize,
    pub max_depth: usize,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn format(&self, detailed: bool) -> String {
        let mut output = String::new();

        output.push_str("\n🔍 Bookmark Tree Integrity Report\n");
        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

        output.push_str(&format!("📁 Folders:   {}\n", self.folders));
        output.push_str(&format!("🔖 Bookmarks: {}\n", self.bookmarks));
        output.push_str(&format!("📏 Depth:     {}\n\n", self.max_depth));

        if self.violations.is_empty() {
            output.push_str("✅ All invariants hold\n");
        } else {
            output.push_str(&format!("❌ {} violation(s)\n", self.violations.len()));
            if detailed {
                for violation in &self.violations {
                    output.push_str(&format!("  • {}\n", violation));
                }
            }
        }

        output.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        output.push_str(&format!(
            "\n📊 Summary: {} nodes checked, {} violation(s)\n\n",
            self.nodes_checked,
            self.violations.len()
        ));

        output
    }
}

/// Check every structural invariant of the forest.
pub fn check_forest(forest: &[Node]) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    match forest.first() {
        Some(root) if root.id == ROOT_ID => {
            if !root.is_folder() {
                report.violations.push(Violation::RootNotFolder);
            }
        }
        _ => report.violations.push(Violation::MissingRoot),
    }
    for extra in forest.iter().skip(1) {
        report.violations.push(Violation::ExtraTopLevel(extra.id.clone()));
    }

    let mut seen = HashSet::new();
    let mut parents: HashMap<String, String> = HashMap::new();
    for node in forest {
        walk(node, 1, &mut seen, &mut parents, &mut report);
    }

    check_parent_chains(&parents, &mut report);
    report
}

fn walk(
    node: &Node,
    depth: usize,
    seen: &mut HashSet<String>,
    parents: &mut HashMap<String, String>,
    report: &mut IntegrityReport,
) {
    report.nodes_checked += 1;
    report.max_depth = report.max_depth.max(depth);

    if !seen.insert(node.id.clone()) {
        report.violations.push(Violation::DuplicateId(node.id.clone()));
    }
    parents.insert(node.id.clone(), node.parent_id.clone());

    if !node.style.matches(node.node_type) {
        report.violations.push(Violation::StyleMismatch(node.id.clone()));
    }

    if node.is_folder() {
        report.folders += 1;
        if node.url.is_some() {
            report.violations.push(Violation::FolderWithUrl(node.id.clone()));
        }
        if node.count != node.children.len() {
            report.violations.push(Violation::CountMismatch {
                id: node.id.clone(),
                count: node.count,
                children: node.children.len(),
            });
        }
    } else {
        report.bookmarks += 1;
        if node.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            report.violations.push(Violation::BookmarkWithoutUrl(node.id.clone()));
        }
        if !node.children.is_empty() {
            report.violations.push(Violation::BookmarkWithChildren(node.id.clone()));
        }
    }

    let indexes: Vec<i64> = node.children.iter().map(|c| c.index).collect();
    if indexes.iter().enumerate().any(|(pos, index)| *index != pos as i64) {
        report.violations.push(Violation::IndexNotDense {
            parent: node.id.clone(),
            indexes,
        });
    }

    for child in &node.children {
        if child.parent_id != node.id {
            report.violations.push(Violation::ParentMismatch {
                id: child.id.clone(),
                listed_under: node.id.clone(),
                parent_id: child.parent_id.clone(),
            });
        }
        walk(child, depth + 1, seen, parents, report);
    }
}

fn check_parent_chains(parents: &HashMap<String, String>, report: &mut IntegrityReport) {
    for start in parents.keys() {
        let mut visited = HashSet::new();
        let mut current = start.as_str();
        while current != ROOT_ID {
            if !visited.insert(current) {
                report.violations.push(Violation::BrokenParentChain(start.clone()));
                break;
            }
            match parents.get(current) {
                Some(parent) => current = parent.as_str(),
                None => {
                    report.violations.push(Violation::BrokenParentChain(start.clone()));
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{find_node_mut, fixtures::sample_forest};

    #[test]
    fn test_sample_forest_is_healthy() {
        let report = check_forest(&sample_forest());
        assert!(report.is_ok(), "{:?}", report.violations);
        assert_eq!(report.folders, 3);
        assert_eq!(report.bookmarks, 4);
        assert_eq!(report.max_depth, 4);
    }

    #[test]
    fn test_detects_duplicate_id() {
        let mut forest = sample_forest();
        find_node_mut(&mut forest, "B2").unwrap().id = "B1".to_string();
        let report = check_forest(&forest);
        assert!(report.violations.contains(&Violation::DuplicateId("B1".to_string())));
    }

    #[test]
    fn test_detects_index_gap() {
        let mut forest = sample_forest();
        find_node_mut(&mut forest, "B2").unwrap().index = 4;
        let report = check_forest(&forest);
        assert!(matches!(
            report.violations.as_slice(),
            [Violation::IndexNotDense { parent, .. }] if parent == "F1"
        ));
    }

    #[test]
    fn test_detects_orphan_parent_link() {
        let mut forest = sample_forest();
        find_node_mut(&mut forest, "B3").unwrap().parent_id = "ghost".to_string();
        let report = check_forest(&forest);
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, Violation::ParentMismatch { id, .. } if id == "B3")));
        assert!(report
            .violations
            .contains(&Violation::BrokenParentChain("B3".to_string())));
    }

    #[test]
    fn test_detects_parent_cycle() {
        let mut forest = sample_forest();
        find_node_mut(&mut forest, "F1").unwrap().parent_id = "F2".to_string();
        let report = check_forest(&forest);
        assert!(report
            .violations
            .contains(&Violation::BrokenParentChain("F1".to_string())));
    }

    #[test]
    fn test_detects_missing_root() {
        let report = check_forest(&[]);
        assert_eq!(report.violations, vec![Violation::MissingRoot]);
    }

    #[test]
    fn test_format_lists_violations_when_detailed() {
        let mut forest = sample_forest();
        find_node_mut(&mut forest, "B1").unwrap().url = None;
        let report = check_forest(&forest);

        let text = report.format(true);
        assert!(text.contains("Integrity Report"));
        assert!(text.contains("bookmark 'B1' has no url"));
        assert!(!report.format(false).contains("bookmark 'B1'"));
    }
}
