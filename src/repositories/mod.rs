//! # Repository Layer
//!
//! Storage for the unit state document behind the [`StateStore`] trait.

pub mod state;

pub use state::{JsonFileStateStore, MemoryStateStore, StateStore, StoreError, UnitState};
