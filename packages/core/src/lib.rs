//! # Isotope Core
//!
//! Shared primitives for isomorphic rendering: the asynchronous value-source
//! contract, content-addressed hydration keys, the component tree, the
//! default markup writer, snapshot wire types, and the connect bridge.
//!
//! The server pass (`isotope-server`) resolves a tree of data-dependent
//! components to HTML plus a serialized snapshot; the browser pass
//! (`isotope-client`) replays that snapshot by key without re-fetching.
//! Both passes are built on the types in this crate.

pub mod connect;
pub mod html;
pub mod key;
pub mod node;
pub mod snapshot;
pub mod source;

#[cfg(test)]
mod tests_connect;




pub use connect::{Connect, ConnectOptions};
pub use html::{escape_html, render_markup};
pub use key::key_for;
pub use node::{contains_isomorphic, iso, IsoComponent, Mode, ProviderFn, VNode, ViewFn};
pub use snapshot::{
    parse_mount_record, snapshot_script, ComponentBucket, IsoData, MountRecord, Snapshot,
    GLOBAL_NAMESPACE,
};
pub use source::{
    constant, failed, from_future, has_value_now, never, value_now, DataStream, Emission,
    ProviderError, SourceItem,
};
