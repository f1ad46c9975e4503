//! Content-addressed hydration keys.
//!
//! A key correlates a component instance's data dependency across the server
//! and browser passes, replacing any reliance on render or mount order. Keys
//! double as the authoritative identity used to splice server-computed state
//! into client state, so the digest must be collision-resistant: a collision
//! silently cross-wires unrelated component instances.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Derive the hydration key for an isomorphic component instance from its
/// declared name and props.
///
/// Props are canonicalized (recursive, sorted object keys) before hashing,
/// so structurally equal props with different insertion order yield the same
/// key, and the key is stable across processes.
pub fn key_for(name: &str, props: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(props, &mut canonical);

    let digest = Sha256::digest(canonical.as_bytes());

    format!("{}--{:x}", name, digest)
}

/// Serialize a JSON value with object keys in sorted order, independent of
/// how the underlying map stores them.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push('{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}
