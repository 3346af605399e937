//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, schema and engine calls into use-case level APIs.
//! - Keep the CLI decoupled from storage details.

pub mod sandbox_service;
