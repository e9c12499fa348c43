// src/lib.rs

//! SynthDB
//!
//! A schema-flexible, versioned, type-partitioned Entity-Attribute-Value
//! store layered atop an embedded SQL engine. Every cell is an append-only
//! versioned value in a type-specific physical table; per-logical-table
//! SQL views assemble the current, non-deleted state on demand.
//!
//! # Architecture
//!
//! - Metadata Store: the logical catalog of tables/columns, soft-deleted
//!   rather than dropped.
//! - Versioned Cell Store: atomic upsert / soft delete / history against
//!   four type-partitioned physical tables.
//! - View Materializer: a pure function of live metadata, rerun after
//!   every schema change.
//! - Branch Manager + Structural Merger: lightweight file-copy branches
//!   of a whole database, with additive-only structural merge between
//!   them.

pub mod backend;
pub mod branch;
pub mod cell_store;
pub mod connection;
mod error;
mod id;
pub mod merge;
pub mod metadata;
mod name;
mod schema;
mod txn;
pub mod value;
mod view;

pub use connection::Connection;
pub use error::{Error, Result};
pub use metadata::model::DataType;
pub use metadata::ColumnSpec;
pub use value::Value;
