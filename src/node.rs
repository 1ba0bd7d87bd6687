use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const ROOT_ID: &str = "root";

/// Current version of the style records. Bumped when a field changes meaning.
pub const STYLE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Folder,
    Bookmark,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Folder => "folder",
            NodeType::Bookmark => "bookmark",
        }
    }
}

/// Display attributes of a folder tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FolderStyle {
    pub version: u32,
    pub color: String,
    pub background_color: String,
    pub image: Option<String>,
    pub font_size: u16,
    pub opacity: f32,
}

impl Default for FolderStyle {
    fn default() -> Self {
        Self {
            version: STYLE_VERSION,
            color: "#1f2937".to_string(),
            background_color: "#fde68a".to_string(),
            image: None,
            font_size: 14,
            opacity: 1.0,
        }
    }
}

/// Display attributes of a bookmark tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookmarkStyle {
    pub version: u32,
    pub color: String,
    pub background_color: String,
    pub image: Option<String>,
    pub font_size: u16,
    pub show_favicon: bool,
    pub show_title: bool,
}

impl Default for BookmarkStyle {
    fn default() -> Self {
        Self {
            version: STYLE_VERSION,
            color: "#111827".to_string(),
            background_color: "#ffffff".to_string(),
            image: None,
            font_size: 13,
            show_favicon: true,
            show_title: true,
        }
    }
}

/// Style carried by a node. The tree model never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Style {
    Folder(FolderStyle),
    Bookmark(BookmarkStyle),
}

impl Style {
    pub fn default_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Folder => Style::Folder(FolderStyle::default()),
            NodeType::Bookmark => Style::Bookmark(BookmarkStyle::default()),
        }
    }

    pub fn matches(&self, node_type: NodeType) -> bool {
        matches!(
            (self, node_type),
            (Style::Folder(_), NodeType::Folder) | (Style::Bookmark(_), NodeType::Bookmark)
        )
    }

    pub fn set_color(&mut self, color: &str) {
        match self {
            Style::Folder(s) => s.color = color.to_string(),
            Style::Bookmark(s) => s.color = color.to_string(),
        }
    }

    pub fn set_background_color(&mut self, color: &str) {
        match self {
            Style::Folder(s) => s.background_color = color.to_string(),
            Style::Bookmark(s) => s.background_color = color.to_string(),
        }
    }
}

/// A folder or a bookmark in the forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub parent_id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub index: i64,
    pub date_added: i64,
    pub date_group_modified: i64,
    pub last_edited: i64,
    #[serde(default)]
    pub count: usize,
    pub style: Style,
    #[serde(default)]
    pub children: Vec<Node>,
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Node {
    /// The fixed root folder of every forest.
    pub fn root() -> Self {
        let mut root = Node::folder(ROOT_ID, ROOT_ID, "Bookmarks");
        root.index = 0;
        root
    }

    pub fn folder(id: &str, parent_id: &str, title: &str) -> Self {
        Self::new(id, parent_id, NodeType::Folder, title, None)
    }

    pub fn bookmark(id: &str, parent_id: &str, title: &str, url: &str) -> Self {
        Self::new(id, parent_id, NodeType::Bookmark, title, Some(url.to_string()))
    }

    fn new(id: &str, parent_id: &str, node_type: NodeType, title: &str, url: Option<String>) -> Self {
        let now = now_millis();
        Self {
            id: id.to_string(),
            parent_id: parent_id.to_string(),
            node_type,
            title: title.to_string(),
            url,
            index: 0,
            date_added: now,
            date_group_modified: now,
            last_edited: now,
            count: 0,
            style: Style::default_for(node_type),
            children: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.node_type == NodeType::Folder
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    /// Number of nodes in this subtree, the node itself included.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_size).sum::<usize>()
    }
}

/// A fresh forest holding only the root folder.
pub fn empty_forest() -> Vec<Node> {
    vec![Node::root()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_shape() {
        let root = Node::root();
        assert_eq!(root.id, ROOT_ID);
        assert_eq!(root.parent_id, ROOT_ID);
        assert!(root.is_folder());
        assert!(root.url.is_none());
    }

    #[test]
    fn test_node_serializes_with_camel_case_keys() {
        let node = Node::bookmark("b1", "root", "Rust", "https://www.rust-lang.org");
        let value = serde_json::to_value(&node).unwrap();

        assert_eq!(value["parentId"], "root");
        assert_eq!(value["type"], "bookmark");
        assert_eq!(value["style"]["kind"], "bookmark");
        assert!(value.get("dateAdded").is_some());
        assert!(value.get("lastEdited").is_some());
    }

    #[test]
    fn test_folder_has_no_url_field() {
        let value = serde_json::to_value(Node::folder("f1", "root", "Work")).unwrap();
        assert!(value.get("url").is_none());
    }

    #[test]
    fn test_style_defaults_fill_missing_fields() {
        let style: Style = serde_json::from_str(r##"{"kind":"folder","color":"#000"}"##).unwrap();
        match style {
            Style::Folder(s) => {
                assert_eq!(s.color, "#000");
                assert_eq!(s.version, STYLE_VERSION);
                assert_eq!(s.font_size, 14);
            }
            Style::Bookmark(_) => panic!("expected a folder style"),
        }
    }

    #[test]
    fn test_subtree_size() {
        let mut folder = Node::folder("f1", "root", "Work");
        folder.children.push(Node::bookmark("b1", "f1", "A", "https://a.example"));
        folder.children.push(Node::bookmark("b2", "f1", "B", "https://b.example"));
        assert_eq!(folder.subtree_size(), 3);
    }
}
