//! # Isotope Server
//!
//! The server pass of the isomorphic rendering protocol: resolve a tree of
//! data-dependent components to HTML by fixed-point iteration, collecting a
//! per-key snapshot of persisted state for browser-side replay.
//!
//! Entry point: [`render_to_html`] (or [`render_to_html_with`] to plug in an
//! alternative rendering collaborator).

pub mod renderer;
pub mod resolve;


pub use renderer::{DefaultServerRenderer, ServerRenderer};
pub use resolve::{
    render_to_html, render_to_html_with, RenderError, RenderOptions, RenderResult, Rendered,
};
