//! Domain records for the Language -> Unit -> Item hierarchy.
//!
//! # Responsibility
//! - Define the typed records exchanged between repository and services.
//! - Own the validation rules every persisted record must satisfy.
//!
//! # Invariants
//! - Every score is finite and within `[0, 100]`.
//! - Items are owned by exactly one Unit, Units by exactly one Language.
//! - Exercise associations are weak: they name items, they never own them.

pub mod item;
pub mod kind;
pub mod language;
pub mod unit;
pub mod validation;
