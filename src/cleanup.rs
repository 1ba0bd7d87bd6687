//! 书签分析模块 - 检测异常书签数据（仅检测，不自动删除）
//!
//! 功能：
//! 1. 检测重复书签 (同一URL出现多次)
//! 2. 检测空文件夹
//!
//! ⚠️ 注意：本模块仅提供检测功能，删除需要用户通过 rm 命令确认（可撤销）

use std::collections::HashMap;

use crate::node::Node;

/// 同一URL的所有书签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub url: String,
    pub ids: Vec<String>,
}

/// 异常检测结果
#[derive(Debug, Default)]
pub struct AnomalyReport {
    /// 多余的重复书签数量 (每组减一)
    pub duplicate_count: usize,
    pub duplicates: Vec<DuplicateGroup>,
    /// 空文件夹 (根目录除外)
    pub empty_folders: Vec<String>,
}

impl AnomalyReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_count == 0 && self.empty_folders.is_empty()
    }

    pub fn format(&self) -> String {
        let mut output = String::new();
        output.push_str("\n📊 Bookmark Analysis\n");
        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

        if !self.duplicates.is_empty() {
            output.push_str(&format!("🔄 Duplicate URLs: {}\n", self.duplicate_count));
            for group in &self.duplicates {
                output.push_str(&format!("  • {} ({})\n", group.url, group.ids.join(", ")));
            }
        }

        if !self.empty_folders.is_empty() {
            output.push_str(&format!("📁 Empty folders: {}\n", self.empty_folders.len()));
            for id in &self.empty_folders {
                output.push_str(&format!("  • {}\n", id));
            }
        }

        if self.is_clean() {
            output.push_str("✅ Bookmarks look good\n");
        } else {
            output.push_str("\n💡 Use the rm command to remove entries (undo is available)\n");
        }

        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        output
    }
}

/// 检测书签中的异常（仅检测，不删除）
pub fn detect_anomalies(forest: &[Node]) -> AnomalyReport {
    let mut report = AnomalyReport::default();
    let mut by_url: HashMap<String, Vec<String>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    collect_bookmark_stats(forest, &mut by_url, &mut order, &mut report);

    for url in order {
        if let Some(ids) = by_url.remove(&url) {
            if ids.len() > 1 {
                report.duplicate_count += ids.len() - 1;
                report.duplicates.push(DuplicateGroup { url, ids });
            }
        }
    }

    report
}

fn collect_bookmark_stats(
    forest: &[Node],
    by_url: &mut HashMap<String, Vec<String>>,
    order: &mut Vec<String>,
    report: &mut AnomalyReport,
) {
    for node in forest {
        if node.is_folder() {
            if node.children.is_empty() && !node.is_root() {
                report.empty_folders.push(node.id.clone());
            }
            collect_bookmark_stats(&node.children, by_url, order, report);
        } else if let Some(ref url) = node.url {
            let normalized = normalize_url(url);
            let ids = by_url.entry(normalized.clone()).or_default();
            if ids.is_empty() {
                order.push(normalized);
            }
            ids.push(node.id.clone());
        }
    }
}

/// 用于重复检测的URL规范化
pub fn normalize_url(url: &str) -> String {
    let mut normalized = url.trim().to_lowercase();
    if let Some(pos) = normalized.find('#') {
        normalized.truncate(pos);
    }
    if normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}
