//! The component tree walked by both render passes.
//!
//! Plain nodes (`Element`, `Text`) render directly to markup. `Isomorphic`
//! nodes carry a data dependency: their subtree is produced by a view
//! function once the component's data provider has emitted a render state.

use crate::source::DataStream;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The two execution modes of the protocol, passed explicitly through
/// options rather than read from process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Server,
    Browser,
}

/// Data provider: `(props, hydration_hint) -> DataStream`.
///
/// The hint is `None` unless replaying from a snapshot. Given a `Some` hint
/// the provider must produce its first emission synchronously; the core
/// detects violations but cannot enforce this beyond reporting them.
pub type ProviderFn = dyn Fn(&Value, Option<&Value>) -> DataStream + Send + Sync;

/// View function: `(props, render_state) -> VNode`.
pub type ViewFn = dyn Fn(&Value, &Value) -> VNode + Send + Sync;

/// An isomorphic component definition: a named pairing of a data provider
/// and the view that consumes its render state.
///
/// The name must be unique per logically distinct isomorphic component
/// across the whole application; it is half of the hydration key and the
/// top-level snapshot bucket name.
pub struct IsoComponent {
    name: String,
    provider: Arc<ProviderFn>,
    view: Arc<ViewFn>,
    timeout: Option<Duration>,
}

impl IsoComponent {
    pub fn new(
        name: impl Into<String>,
        provider: impl Fn(&Value, Option<&Value>) -> DataStream + Send + Sync + 'static,
        view: impl Fn(&Value, &Value) -> VNode + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            provider: Arc::new(provider),
            view: Arc::new(view),
            timeout: None,
        })
    }

    /// Like [`IsoComponent::new`], with a deadline for the source's first
    /// emission during server rendering.
    pub fn with_timeout(
        name: impl Into<String>,
        provider: impl Fn(&Value, Option<&Value>) -> DataStream + Send + Sync + 'static,
        view: impl Fn(&Value, &Value) -> VNode + Send + Sync + 'static,
        timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            provider: Arc::new(provider),
            view: Arc::new(view),
            timeout: Some(timeout),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Invoke the data provider for an instance.
    pub fn data(&self, props: &Value, hint: Option<&Value>) -> DataStream {
        (self.provider)(props, hint)
    }

    /// Invoke the view with a resolved render state.
    pub fn render(&self, props: &Value, render_state: &Value) -> VNode {
        (self.view)(props, render_state)
    }
}

impl fmt::Debug for IsoComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsoComponent")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A node in the component tree.
#[derive(Debug, Clone)]
pub enum VNode {
    /// HTML element. Attributes are ordered so markup output is
    /// byte-deterministic.
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        children: Vec<VNode>,
    },

    /// Text node.
    Text { content: String },

    /// Instance of an isomorphic component.
    Isomorphic {
        component: Arc<IsoComponent>,
        props: Value,
    },
}

impl VNode {
    pub fn element(tag: impl Into<String>) -> Self {
        VNode::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        VNode::Text {
            content: content.into(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let VNode::Element {
            ref mut attributes, ..
        } = self
        {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        if let VNode::Element {
            ref mut children, ..
        } = self
        {
            children.push(child);
        }
        self
    }

    pub fn with_children(mut self, new_children: Vec<VNode>) -> Self {
        if let VNode::Element {
            ref mut children, ..
        } = self
        {
            children.extend(new_children);
        }
        self
    }
}

impl PartialEq for VNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                VNode::Element {
                    tag: a_tag,
                    attributes: a_attrs,
                    children: a_children,
                },
                VNode::Element {
                    tag: b_tag,
                    attributes: b_attrs,
                    children: b_children,
                },
            ) => a_tag == b_tag && a_attrs == b_attrs && a_children == b_children,
            (VNode::Text { content: a }, VNode::Text { content: b }) => a == b,
            (
                VNode::Isomorphic {
                    component: a_component,
                    props: a_props,
                },
                VNode::Isomorphic {
                    component: b_component,
                    props: b_props,
                },
            ) => Arc::ptr_eq(a_component, b_component) && a_props == b_props,
            _ => false,
        }
    }
}

/// Construct an instance node for an isomorphic component.
pub fn iso(component: &Arc<IsoComponent>, props: Value) -> VNode {
    VNode::Isomorphic {
        component: Arc::clone(component),
        props,
    }
}

/// Does the tree contain any data-dependent node?
pub fn contains_isomorphic(node: &VNode) -> bool {
    match node {
        VNode::Isomorphic { .. } => true,
        VNode::Element { children, .. } => children.iter().any(contains_isomorphic),
        VNode::Text { .. } => false,
    }
}
