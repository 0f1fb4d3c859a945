//! Core runtime primitives: the record store, schema types, rule
//! language, hook pipeline, and bootstrap orchestration.

pub mod admin;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod hooks;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod store;
pub mod sync;
pub mod time;
