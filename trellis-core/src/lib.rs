//! Trellis Core
//!
//! Core types for the Trellis pipeline compiler.
//!
//! This crate contains:
//! - Domain types: templates, port types, parameters, bindings, credentials
//!   and authored pipeline definitions
//! - DTOs: the compiled artifact handed to the execution engine

pub mod domain;
pub mod dto;
