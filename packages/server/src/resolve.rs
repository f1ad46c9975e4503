//! The fixed-point resolution loop.
//!
//! A resolution repeatedly expands the component tree synchronously,
//! registering a data source for every isomorphic node it encounters that
//! the registry does not already know. Sources that emit synchronously
//! resolve in place, so their subtrees expand within the same pass; the
//! rest become pending keys. After each pass, every pending key's first
//! emission is awaited concurrently, and the tree is expanded again to
//! discover nodes that only become reachable once prior data is known.
//! The loop terminates when an expansion pass leaves nothing pending.
//!
//! Invariants:
//! - A key, once registered, is never fetched again within the same
//!   resolution: at most one fetch per logical node per server render.
//!   Sibling nodes with equal name and props share one fetch and one
//!   snapshot entry.
//! - The registry, pending set and snapshot are scoped to one
//!   `render_to_html` call; concurrent renders cannot cross-contaminate.
//! - The first error raised by any registered source aborts the whole
//!   resolution. Partial markup is never returned.

use crate::renderer::{DefaultServerRenderer, ServerRenderer};
use futures::future;
use futures::stream::StreamExt;
use isotope_core::{
    escape_html, key_for, snapshot_script, value_now, DataStream, Emission, MountRecord, Snapshot,
    VNode,
};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The underlying source failed. Displays the source's error value
    /// verbatim, so the caller observes the original error.
    #[error("{message}")]
    Provider { name: String, message: String },

    #[error(
        "data source for isomorphic component '{name}' (key {key}) did not emit before its deadline"
    )]
    Timeout { name: String, key: String },

    #[error("data source for isomorphic component '{name}' (key {key}) completed without emitting")]
    SourceCompletedEmpty { name: String, key: String },

    /// An isomorphic node was found under a non-isomorphic root, where no
    /// resolution is running.
    #[error("isomorphic component '{name}' encountered under a non-isomorphic root")]
    UnexpectedIsomorphic { name: String },

    #[error("failed to serialize hydration snapshot: {message}")]
    SnapshotSerialization { message: String },
}

/// Output of the render entry point: an HTML body fragment wrapping the
/// tree in its mount container, plus any out-of-band head markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub head: String,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Optional class for the mount-point container.
    pub class_name: Option<String>,
    /// Mount element id. Defaults to a fresh UUID; injectable for
    /// deterministic output.
    pub mount_id: Option<String>,
}

/// One registered source. `Pending` still owes its first emission;
/// `Resolved` keeps the render state for every later expansion pass.
enum Slot {
    Pending(PendingSource),
    Resolved(ResolvedSource),
}

struct PendingSource {
    name: String,
    timeout: Option<Duration>,
    stream: DataStream,
}

struct ResolvedSource {
    render_state: Value,
}

/// State for one resolution call.
struct ResolvePass {
    registry: HashMap<String, Slot>,
    snapshot: Snapshot,
}

impl ResolvePass {
    fn new() -> Self {
        Self {
            registry: HashMap::new(),
            snapshot: Snapshot::new(),
        }
    }

    fn pending_keys(&self) -> Vec<String> {
        self.registry
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Pending(_) => Some(key.clone()),
                Slot::Resolved(_) => None,
            })
            .collect()
    }

    fn resolve(&mut self, key: String, emission: Emission) {
        if let Some(persist_state) = emission.persist_state {
            self.snapshot.insert(key.clone(), persist_state);
        }
        self.registry.insert(
            key,
            Slot::Resolved(ResolvedSource {
                render_state: emission.render_state,
            }),
        );
    }

    /// One synchronous expansion pass. Unresolved isomorphic nodes expand
    /// to an empty placeholder; their markup is discarded anyway, since
    /// another pass follows once they resolve.
    fn expand(&mut self, node: &VNode) -> RenderResult<VNode> {
        match node {
            VNode::Element {
                tag,
                attributes,
                children,
            } => {
                let mut expanded = Vec::with_capacity(children.len());
                for child in children {
                    expanded.push(self.expand(child)?);
                }
                Ok(VNode::Element {
                    tag: tag.clone(),
                    attributes: attributes.clone(),
                    children: expanded,
                })
            }

            VNode::Text { .. } => Ok(node.clone()),

            VNode::Isomorphic { component, props } => {
                let key = key_for(component.name(), props);

                // Registry check before invoking the provider: a key fetches
                // at most once per resolution.
                if !self.registry.contains_key(&key) {
                    let mut stream = component.data(props, None);
                    match value_now(&mut stream) {
                        Some(Ok(emission)) => {
                            debug!(key = %key, "source emitted synchronously");
                            self.resolve(key.clone(), emission);
                        }
                        Some(Err(error)) => {
                            return Err(RenderError::Provider {
                                name: component.name().to_string(),
                                message: error.message,
                            });
                        }
                        None => {
                            debug!(key = %key, "source pending");
                            self.registry.insert(
                                key.clone(),
                                Slot::Pending(PendingSource {
                                    name: component.name().to_string(),
                                    timeout: component.timeout(),
                                    stream,
                                }),
                            );
                        }
                    }
                }

                let render_state = match self.registry.get(&key) {
                    Some(Slot::Resolved(resolved)) => Some(resolved.render_state.clone()),
                    _ => None,
                };

                match render_state {
                    Some(state) => {
                        let subtree = component.render(props, &state);
                        self.expand(&subtree)
                    }
                    None => Ok(VNode::text("")),
                }
            }
        }
    }

    /// Await the first emission of every currently pending key, all started
    /// before any is awaited, so total latency is bounded by the slowest
    /// source rather than the sum.
    async fn await_pending(&mut self) -> RenderResult<()> {
        let keys = self.pending_keys();

        let mut waits = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(Slot::Pending(pending)) = self.registry.remove(&key) {
                waits.push(await_first(key, pending));
            }
        }

        for (key, emission) in future::try_join_all(waits).await? {
            self.resolve(key, emission);
        }

        Ok(())
    }
}

async fn await_first(key: String, source: PendingSource) -> RenderResult<(String, Emission)> {
    let PendingSource {
        name,
        timeout,
        stream,
    } = source;

    let first = match timeout {
        Some(deadline) => match tokio::time::timeout(deadline, stream.into_future()).await {
            Ok((first, _rest)) => first,
            Err(_) => return Err(RenderError::Timeout { name, key }),
        },
        None => stream.into_future().await.0,
    };

    match first {
        Some(Ok(emission)) => Ok((key, emission)),
        Some(Err(error)) => Err(RenderError::Provider {
            name,
            message: error.message,
        }),
        None => Err(RenderError::SourceCompletedEmpty { name, key }),
    }
}

/// Render a component tree to HTML with the default markup renderer.
pub async fn render_to_html(root: &VNode, options: RenderOptions) -> RenderResult<Rendered> {
    let mut renderer = DefaultServerRenderer::default();
    render_to_html_with(root, &mut renderer, options).await
}

/// Render a component tree to HTML with an alternative rendering
/// collaborator.
///
/// An isomorphic root runs the full resolution protocol and emits the
/// hydration snapshot script alongside the mount container. A plain tree
/// renders immediately, with no mount id and no snapshot.
#[instrument(skip_all)]
pub async fn render_to_html_with<R: ServerRenderer>(
    root: &VNode,
    renderer: &mut R,
    options: RenderOptions,
) -> RenderResult<Rendered> {
    let (component_name, props) = match root {
        VNode::Isomorphic { component, props } => {
            (component.name().to_string(), props.clone())
        }
        _ => {
            ensure_no_isomorphic(root)?;
            renderer.render(root);
            let body = format!(
                "<div{}>{}</div>",
                class_attr(&options),
                renderer.body_html()
            );
            return Ok(Rendered {
                head: renderer.head_html().to_string(),
                body,
            });
        }
    };

    let element_id = options
        .mount_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let mut pass = ResolvePass::new();
    let mut passes = 0usize;

    let tree = loop {
        passes += 1;
        let expanded = pass.expand(root)?;
        let pending = pass.pending_keys();

        if pending.is_empty() {
            break expanded;
        }

        debug!(pass = passes, pending = pending.len(), "awaiting pending keys");
        pass.await_pending().await?;
    };

    info!(
        component = %component_name,
        passes,
        keys = pass.snapshot.len(),
        "resolution complete"
    );

    renderer.render(&tree);

    let record = MountRecord::new(props, Some(pass.snapshot));
    let script = snapshot_script(&component_name, &element_id, &record).map_err(|error| {
        RenderError::SnapshotSerialization {
            message: error.to_string(),
        }
    })?;

    let body = format!(
        "<div id=\"{element_id}\"{class}>{markup}</div>{script}",
        class = class_attr(&options),
        markup = renderer.body_html(),
    );

    Ok(Rendered {
        head: renderer.head_html().to_string(),
        body,
    })
}

fn class_attr(options: &RenderOptions) -> String {
    match options.class_name.as_deref() {
        Some(class_name) => format!(" class=\"{}\"", escape_html(class_name)),
        None => String::new(),
    }
}

fn ensure_no_isomorphic(node: &VNode) -> RenderResult<()> {
    match node {
        VNode::Isomorphic { component, .. } => Err(RenderError::UnexpectedIsomorphic {
            name: component.name().to_string(),
        }),
        VNode::Element { children, .. } => {
            for child in children {
                ensure_no_isomorphic(child)?;
            }
            Ok(())
        }
        VNode::Text { .. } => Ok(()),
    }
}
