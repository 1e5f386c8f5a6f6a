//! pgconsul library: a client for a consul agent's HTTP API.
//!
//! This crate reads and writes key/value entries, reports the cluster
//! leader, peer set, and agent self description, and projects those
//! replies into text rows for database-extension bindings.  Decoding is
//! strict about JSON shape and reports failures through [`ConsulError`].

pub mod agent;
pub mod client;
pub mod config;
pub mod errors;
pub mod json;
pub mod kv;
pub mod metrics;
pub mod rows;
pub mod status;

pub use agent::Agent;
pub use client::ConsulClient;
pub use errors::ConsulError;
