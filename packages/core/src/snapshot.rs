//! Snapshot wire types.
//!
//! The server serializes, per mount point, the instance props plus a map
//! from hydration key to persisted state. The page stores it under
//! `window[GLOBAL_NAMESPACE][componentName][mountElementId]`, and the
//! browser pass replays it by key. Ordered maps keep serialization
//! byte-deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The global namespace the snapshot is attached to on the page.
pub const GLOBAL_NAMESPACE: &str = "__ISO_DATA__";

/// Persisted state per hydration key, accumulated over one whole server
/// resolution. Immutable once serialized.
pub type Snapshot = BTreeMap<String, Value>;

/// Snapshot data for one mount point: the instance props and the persisted
/// state of every data-dependent node under it, nested ones included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountRecord {
    pub props: Value,
    pub hydration: Option<Snapshot>,
    /// Runtime-only flag set by the browser pass; never serialized.
    #[serde(skip)]
    pub hydrated: bool,
}

impl MountRecord {
    pub fn new(props: Value, hydration: Option<Snapshot>) -> Self {
        Self {
            props,
            hydration,
            hydrated: false,
        }
    }
}

/// All mount points recorded for one isomorphic component name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentBucket {
    #[serde(flatten)]
    pub mounts: BTreeMap<String, MountRecord>,
    /// Runtime-only flag set once every mount point has been processed.
    #[serde(skip)]
    pub hydrated: bool,
}

/// The whole-page snapshot: component name to bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsoData {
    pub components: BTreeMap<String, ComponentBucket>,
}

impl IsoData {
    pub fn insert(&mut self, name: impl Into<String>, element_id: impl Into<String>, record: MountRecord) {
        self.components
            .entry(name.into())
            .or_default()
            .mounts
            .insert(element_id.into(), record);
    }

    pub fn bucket(&self, name: &str) -> Option<&ComponentBucket> {
        self.components.get(name)
    }

    pub fn bucket_mut(&mut self, name: &str) -> Option<&mut ComponentBucket> {
        self.components.get_mut(name)
    }
}

/// Render the inline script that stores a mount point's record on the page.
///
/// The emitted JavaScript builds the `[namespace][name][elementId]` chain
/// and assigns `{props, hydration}` into it.
pub fn snapshot_script(
    name: &str,
    element_id: &str,
    record: &MountRecord,
) -> Result<String, serde_json::Error> {
    // "<" is escaped so no payload string can close the script element
    // early.
    let json = serde_json::to_string(record)?.replace('<', "\\u003c");

    Ok(format!(
        "<script type=\"text/javascript\">Object.assign([\"{GLOBAL_NAMESPACE}\",\"{name}\",\"{element_id}\"]\
.reduce(function(a,b){{return a[b]=a[b]||{{}};}},window),{json});</script>"
    ))
}

/// Extract `(componentName, mountElementId, record)` back out of a rendered
/// body fragment. The inverse of [`snapshot_script`], used when consuming a
/// server-rendered page outside a JavaScript runtime.
pub fn parse_mount_record(body: &str) -> Option<(String, String, MountRecord)> {
    let assign_marker = "Object.assign([\"";
    let start = body.find(assign_marker)? + assign_marker.len();
    let rest = &body[start..];

    let mut parts = rest.splitn(3, "\",\"");
    let namespace = parts.next()?;
    if namespace != GLOBAL_NAMESPACE {
        return None;
    }
    let name = parts.next()?;
    let tail = parts.next()?;

    let id_end = tail.find("\"]")?;
    let element_id = &tail[..id_end];

    let payload_marker = "},window),";
    let payload_start = tail.find(payload_marker)? + payload_marker.len();
    let payload_end = tail.rfind(");</script>")?;
    let record: MountRecord = serde_json::from_str(&tail[payload_start..payload_end]).ok()?;

    Some((name.to_string(), element_id.to_string(), record))
}
