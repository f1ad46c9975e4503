//! The browser pass: replay a snapshot into live mounts.
//!
//! For each mount point recorded under a component's snapshot bucket, the
//! data provider is re-invoked with the persisted state for its key as a
//! hint. A hinted provider must emit its first value synchronously; the
//! replayed value seeds a [`Connect`] bridge so the mount keeps receiving
//! later emissions, and the view re-renders from the replayed state without
//! any network round trip. Nested data-dependent nodes replay from the same
//! per-mount snapshot, looked up by their own key.
//!
//! Failures are contained per mount: a mount whose provider misbehaves (or
//! whose element is missing from the document) is logged and skipped, and
//! the remaining mounts still hydrate. Only a host attach failure aborts the
//! call, since at that point the document itself is in doubt.

use isotope_core::{
    key_for, value_now, Connect, ConnectOptions, IsoComponent, IsoData, Mode, Snapshot, VNode,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub type HydrateResult<T> = Result<T, HydrateError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HydrateError {
    /// A hinted provider deferred its first emission. Hydration data was on
    /// the page for this key, so the provider was expected to replay it
    /// without going asynchronous.
    #[error(
        "data source for '{name}' at mount '{element_id}' did not emit synchronously during hydration"
    )]
    NotSynchronous { name: String, element_id: String },

    /// Hydration was attempted outside an asynchronous runtime. The bridges
    /// created for each mount spawn drain tasks, so a tokio runtime must be
    /// ambient.
    #[error("cannot hydrate '{name}': subscription bridges need an ambient tokio runtime")]
    NoRuntime { name: String },

    /// The underlying source failed during replay. Displays the source's
    /// error value verbatim.
    #[error("{message}")]
    Provider {
        name: String,
        element_id: String,
        message: String,
    },

    #[error("failed to attach hydrated mount '{element_id}' for '{name}': {message}")]
    Attach {
        name: String,
        element_id: String,
        message: String,
    },
}

/// Failure raised by a [`HydrateHost`] while attaching a mount.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AttachError {
    pub message: String,
}

impl AttachError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The document-side collaborator: whatever owns the real mount elements.
pub trait HydrateHost {
    /// Is the mount element present in the document?
    fn has_element(&self, element_id: &str) -> bool;

    /// Attach a hydrated mount to its element.
    fn attach(&mut self, mount: &HydratedMount) -> Result<(), AttachError>;
}

/// One successfully hydrated mount point: the resolved tree plus the live
/// subscription bridges feeding it.
#[derive(Debug)]
pub struct HydratedMount {
    pub component: Arc<IsoComponent>,
    pub element_id: String,
    pub tree: VNode,
    pub bridges: Vec<Connect>,
}

#[derive(Debug, Clone)]
pub struct HydrateOptions {
    /// Explicit execution mode. Hydration is a no-op on the server.
    pub mode: Mode,
    /// Warn when no snapshot bucket exists for the component. Off by
    /// default: pages without this component are routine.
    pub warn_if_not_found: bool,
    /// Warn when the bucket was already hydrated by an earlier call.
    pub warn_if_already_hydrated: bool,
    /// Bridge options applied to every subscription created during
    /// hydration.
    pub connect: ConnectOptions,
}

impl Default for HydrateOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Browser,
            warn_if_not_found: false,
            warn_if_already_hydrated: true,
            connect: ConnectOptions::default(),
        }
    }
}

/// Hydrate every recorded mount point of one component.
///
/// Returns the mounts that attached successfully. Processed mounts and the
/// bucket itself are flagged so a second call over the same data is a no-op.
///
/// Must be called within a tokio runtime: every hydrated node gets a live
/// [`Connect`] bridge whose drain task is spawned on it. Outside a runtime
/// the call fails with [`HydrateError::NoRuntime`] before touching any
/// mount.
#[instrument(skip_all, fields(component = component.name()))]
pub fn hydrate(
    component: &Arc<IsoComponent>,
    data: &mut IsoData,
    host: &mut impl HydrateHost,
    options: &HydrateOptions,
) -> HydrateResult<Vec<HydratedMount>> {
    if options.mode == Mode::Server {
        return Ok(Vec::new());
    }

    let name = component.name().to_string();

    if tokio::runtime::Handle::try_current().is_err() {
        return Err(HydrateError::NoRuntime { name });
    }

    let Some(bucket) = data.bucket_mut(&name) else {
        if options.warn_if_not_found {
            warn!(component = %name, "no snapshot data on the page; nothing to hydrate");
        }
        return Ok(Vec::new());
    };

    if bucket.hydrated {
        if options.warn_if_already_hydrated {
            warn!(component = %name, "snapshot bucket already hydrated; skipping");
        }
        return Ok(Vec::new());
    }

    let mut mounts = Vec::new();

    for (element_id, record) in bucket.mounts.iter_mut() {
        if record.hydrated {
            error!(component = %name, element_id = %element_id, "mount already hydrated; skipping");
            continue;
        }

        if !host.has_element(element_id) {
            error!(component = %name, element_id = %element_id, "mount element missing from document; skipping");
            continue;
        }

        let props = record.props.clone();
        let hydration = record.hydration.clone().unwrap_or_default();
        let mut bridges = Vec::new();

        let tree = match expand_mount(
            component,
            &props,
            &hydration,
            element_id,
            &options.connect,
            &mut bridges,
        ) {
            Ok(tree) => tree,
            Err(err) => {
                error!(component = %name, element_id = %element_id, error = %err, "mount failed to hydrate; skipping");
                continue;
            }
        };

        let mount = HydratedMount {
            component: Arc::clone(component),
            element_id: element_id.clone(),
            tree,
            bridges,
        };

        if let Err(attach_error) = host.attach(&mount) {
            error!(component = %name, element_id = %element_id, error = %attach_error, "host rejected hydrated mount");
            return Err(HydrateError::Attach {
                name,
                element_id: element_id.clone(),
                message: attach_error.message,
            });
        }

        record.hydrated = true;
        mounts.push(mount);
    }

    bucket.hydrated = true;
    info!(component = %name, mounts = mounts.len(), "hydration complete");

    Ok(mounts)
}

/// Replay one data-dependent node: look up its key in the mount's snapshot,
/// invoke the provider with the hint, require a synchronous first emission,
/// and keep the subscription alive through a bridge.
fn expand_mount(
    component: &Arc<IsoComponent>,
    props: &Value,
    hydration: &Snapshot,
    element_id: &str,
    connect: &ConnectOptions,
    bridges: &mut Vec<Connect>,
) -> HydrateResult<VNode> {
    let key = key_for(component.name(), props);
    let mut stream = component.data(props, hydration.get(&key));

    let emission = match value_now(&mut stream) {
        Some(Ok(emission)) => emission,
        Some(Err(error)) => {
            return Err(HydrateError::Provider {
                name: component.name().to_string(),
                element_id: element_id.to_string(),
                message: error.message,
            })
        }
        None => {
            return Err(HydrateError::NotSynchronous {
                name: component.name().to_string(),
                element_id: element_id.to_string(),
            })
        }
    };

    let subtree = component.render(props, &emission.render_state);
    bridges.push(Connect::with_initial(
        emission.render_state,
        stream,
        connect.clone(),
    ));

    expand_tree(&subtree, hydration, element_id, connect, bridges)
}

fn expand_tree(
    node: &VNode,
    hydration: &Snapshot,
    element_id: &str,
    connect: &ConnectOptions,
    bridges: &mut Vec<Connect>,
) -> HydrateResult<VNode> {
    match node {
        VNode::Element {
            tag,
            attributes,
            children,
        } => {
            let mut expanded = Vec::with_capacity(children.len());
            for child in children {
                expanded.push(expand_tree(child, hydration, element_id, connect, bridges)?);
            }
            Ok(VNode::Element {
                tag: tag.clone(),
                attributes: attributes.clone(),
                children: expanded,
            })
        }

        VNode::Text { .. } => Ok(node.clone()),

        VNode::Isomorphic { component, props } => {
            expand_mount(component, props, hydration, element_id, connect, bridges)
        }
    }
}
