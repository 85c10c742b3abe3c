//! scripthook SDK - Script Runtime Type Definitions
//!
//! This crate describes the object model of the embedded script engine:
//! type ids, type metadata, values, and the engine/function/module/context
//! interfaces a concrete engine binding implements.
//! It has no dependencies and compiles quickly, allowing parallel compilation
//! of dependent crates.
//!
//! # Modules
//!
//! - [`types`] - Type ids, object flags, and type metadata
//! - [`value`] - Tagged values and generic `?&` references
//! - [`interfaces`] - Engine, function, module, and context traits

pub mod interfaces;
pub mod types;
pub mod value;

pub use interfaces::*;
pub use types::*;
pub use value::*;
