//! Graph overlay domain model.
//!
//! # Responsibility
//! - Define the element/property shapes the sandbox engines reason about.
//! - Define client-facing diff and publish/undo item records.
//!
//! # Invariants
//! - Elements and property revisions are immutable snapshots; engines never
//!   mutate them in place and express changes as `ElementMutation`s instead.
//! - Sandbox status is derived per call and never persisted.

pub mod context;
pub mod element;
pub mod item;
pub mod status;
pub mod visibility;
