//! Core types and trait definitions for Grove group authorization.
//!
//! This crate is deliberately free of runtime and database dependencies. It
//! names the group model, the policy-tuple vocabulary and the three external
//! contracts (group store, policy store, identity resolver) that the
//! authorization service in `grove-authz` orchestrates.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod group;
pub mod identity;
pub mod policy;
pub mod store;

pub use error::{Error, Result};
