//! World engine for keepmud: abilities and proficiency, combat resolution, item study,
//! keeper authorization, actor persistence, and the task that owns the live world.
//!
//! Everything that mutates the world goes through [`shard::Shard`], which applies one
//! request at a time.

pub mod abilities;
pub mod actor;
pub mod authz;
pub mod command;
pub mod error;
pub mod exec;
pub mod items;
pub mod mobs;
pub mod reaction;
pub mod rng;
pub mod rooms;
pub mod shard;
pub mod store;
pub mod study;
pub mod view;
pub mod world;

pub use error::{CommandError, StoreError};
