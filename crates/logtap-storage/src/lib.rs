//! # logtap Storage
//!
//! Durability layer for logtap: the checkpoint registry that remembers, per
//! input, the position of the last record accepted downstream.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

/// Checkpoint store trait and its file-backed and in-memory implementations.
pub mod checkpoint_store;

pub use checkpoint_store::{
    CheckpointStore, CheckpointStoreError, FileSystemCheckpointStore, InMemoryCheckpointStore,
};
