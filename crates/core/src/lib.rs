//! Core types and pure functions for robostore.
//!
//! Everything in this crate is free of I/O: domain models, the [`item::Item`]
//! trait and record tagging, validation, filters, pagination tokens, object
//! key derivation, provisioning plans, and the storage traits implemented by
//! the `robostore` crate.

pub mod admin;
pub mod item;
pub mod models;
pub mod objects;
pub mod storage;
