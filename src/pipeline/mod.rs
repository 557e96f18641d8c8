//! Pipeline stages for turning guides into documents.
//!
//! Each submodule implements one step and is testable on its own against a
//! scripted [`crate::renderer::Session`].
//!
//! ## Data Flow
//!
//! ```text
//!                     ┌──────────────── per section, in order ────────────────┐
//! discover ──▶ guide ─┤ navigate ──▶ dimensions ──▶ validate   (= section)    ├─▶ merge
//! (catalog,   (state  └───────────────────────────────────────────────────────┘   (lopdf)
//!  TOC)        machine)
//! ```
//!
//! 1. [`discover`]   — read the catalog and a guide's table of contents; sanitise titles
//! 2. [`navigate`]   — open a URL with a bounded, shared retry budget
//! 3. [`dimensions`] — measure the page so the snapshot is one tall page
//! 4. [`validate`]   — re-render until the snapshot is plausibly complete
//! 5. [`section`]    — steps 2–4 for one section, plus reuse of finished work
//! 6. [`merge`]      — concatenate snapshots in index order; runs in `spawn_blocking`
//! 7. [`guide`]      — the per-guide state machine tying it all together

pub mod dimensions;
pub mod discover;
pub mod guide;
pub mod merge;
pub mod navigate;
pub mod section;
pub mod validate;
