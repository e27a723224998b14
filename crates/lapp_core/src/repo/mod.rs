//! Persistence gateway for the study hierarchy.
//!
//! # Responsibility
//! - Define the narrow storage contract the scoring core depends on.
//! - Keep SQL details out of scoring, aggregation and selection logic.
//!
//! # Invariants
//! - Writes validate records before touching SQL.
//! - "Not found" on reads is `Ok(None)`; semantic failures such as
//!   `DuplicateKey` are distinct from transport errors.

pub mod study_repo;
