use crate::node::Node;

/// Indented text view of a subtree, one node per line.
pub fn render_tree(node: &Node, max_depth: Option<usize>) -> String {
    let mut output = String::new();
    render_into(node, 0, max_depth, &mut output);
    output
}

fn render_into(node: &Node, depth: usize, max_depth: Option<usize>, output: &mut String) {
    let indent = "  ".repeat(depth);
    if node.is_folder() {
        output.push_str(&format!(
            "{}📁 {} [{}] ({} items)\n",
            indent, node.title, node.id, node.count
        ));
    } else {
        output.push_str(&format!(
            "{}🔖 {} [{}] {}\n",
            indent,
            node.title,
            node.id,
            node.url.as_deref().unwrap_or_default()
        ));
    }

    if max_depth.is_some_and(|max| depth >= max) {
        return;
    }

    let mut children: Vec<&Node> = node.children.iter().collect();
    children.sort_by_key(|c| c.index);
    for child in children {
        render_into(child, depth + 1, max_depth, output);
    }
}
