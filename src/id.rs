// src/id.rs

//! Row identity generation.
//!
//! Row IDs are opaque, collision-resistant strings generated client-side.
//! There is no process-wide counter and no database round-trip: two callers
//! on two different connections can mint IDs concurrently without
//! coordination.

use uuid::Uuid;

/// Generate a new opaque row identifier.
pub fn new_row_id() -> String {
    Uuid::new_v4().to_string()
}
