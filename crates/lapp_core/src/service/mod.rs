//! Mastery scoring core.
//!
//! # Responsibility
//! - Score practice outcomes and aggregate them up the hierarchy.
//! - Select the learner's current unit and allocate readable ids.
//! - Expose the whole engine through [`mastery_service::MasteryService`].
//!
//! # Invariants
//! - Services reach storage only through `StudyRepository`.
//! - "Today" always comes from an injected [`clock::Clock`].

pub mod aggregation;
pub mod allocator;
pub mod associations;
pub mod clock;
pub mod error;
pub mod mastery_service;
pub mod position;
pub mod scorer;
