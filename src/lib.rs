//! rulekernel - a verified rule kernel
//!
//! Versioned premise/verdict rules over a closed fact vocabulary, conflict
//! screening before activation, and publication gated on an external
//! verifier or a compiled certificate.

pub mod api;
pub mod certificate;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod kernel;
pub mod observability;
pub mod publish;
pub mod registry;
pub mod retrieval;
pub mod rules;
pub mod snapshot;
pub mod store;
pub mod verify;
