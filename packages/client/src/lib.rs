//! # Isotope Client
//!
//! The browser pass of the isomorphic rendering protocol: replay the
//! snapshot a server render left on the page into live component mounts,
//! with no re-fetching.
//!
//! Entry point: [`hydrate`].

pub mod hydrate;


pub use hydrate::{
    hydrate, AttachError, HydrateError, HydrateHost, HydrateOptions, HydrateResult, HydratedMount,
};
