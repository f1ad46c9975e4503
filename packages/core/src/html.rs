//! Synchronous markup writer: `VNode` tree to an HTML string.
//!
//! This is the default rendering collaborator. `Isomorphic` nodes render to
//! nothing here; resolution expands them into plain nodes before markup
//! generation.

use crate::node::VNode;

/// Render a tree to an HTML fragment.
pub fn render_markup(node: &VNode) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

fn write_node(node: &VNode, out: &mut String) {
    match node {
        VNode::Element {
            tag,
            attributes,
            children,
        } => {
            out.push('<');
            out.push_str(tag);

            for (name, value) in attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_html(value));
                out.push('"');
            }

            if children.is_empty() && is_void_element(tag) {
                out.push_str("/>");
                return;
            }

            out.push('>');

            for child in children {
                write_node(child, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }

        VNode::Text { content } => {
            out.push_str(&escape_html(content));
        }

        VNode::Isomorphic { .. } => {}
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "img"
            | "input"
            | "br"
            | "hr"
            | "meta"
            | "link"
            | "area"
            | "base"
            | "col"
            | "embed"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}
