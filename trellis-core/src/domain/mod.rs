//! Core domain types
//!
//! This module contains the structures shared by every Trellis crate: the
//! semantic type system, resolved templates, parameters, bindings, credential
//! references and the authored pipeline definition.

pub mod binding;
pub mod credential;
pub mod parameter;
pub mod pipeline;
pub mod template;
pub mod types;
