//! The pluggable rendering collaborator for the server pass.
//!
//! A renderer turns a fully resolved tree into markup, and may contribute
//! out-of-band head markup (collected stylesheet rules, for instance).
//! The resolution loop is renderer-agnostic; alternative engines implement
//! [`ServerRenderer`].

use isotope_core::{render_markup, VNode};

pub trait ServerRenderer {
    /// Synchronously render a resolved tree, replacing any previously
    /// collected output.
    fn render(&mut self, tree: &VNode);

    /// Out-of-band markup for the document head.
    fn head_html(&self) -> &str;

    /// The rendered body fragment.
    fn body_html(&self) -> &str;
}

/// Markup-only renderer over the core markup writer. Contributes no head
/// markup.
#[derive(Debug, Default)]
pub struct DefaultServerRenderer {
    head_html: String,
    body_html: String,
}

impl ServerRenderer for DefaultServerRenderer {
    fn render(&mut self, tree: &VNode) {
        self.body_html = render_markup(tree);
    }

    fn head_html(&self) -> &str {
        &self.head_html
    }

    fn body_html(&self) -> &str {
        &self.body_html
    }
}
