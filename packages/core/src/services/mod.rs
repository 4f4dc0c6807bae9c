//! Nested Set Services
//!
//! This module contains the nested set engine:
//!
//! - `NestedSetService` - Handle on one forest (store, bindings, scope)
//! - Query operations - Range-arithmetic reads (ancestors, children, siblings)
//! - Mutation operations - Insert, remove, swap, sort and move
//! - `IntegrityChecker` - Invariant verification over a snapshot
//!
//! Services coordinate between the store layer and callers; all interval
//! arithmetic lives here, never in a store adapter.

pub mod error;
pub mod integrity;
mod mutation_service;
mod nested_set_service;
pub mod query_service;

pub use error::NestedSetError;
pub use integrity::{IntegrityChecker, IntegrityReport, Violation};
pub use nested_set_service::NestedSetService;
