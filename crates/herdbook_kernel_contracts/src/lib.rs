#![forbid(unsafe_code)]

pub mod breeding;
pub mod common;
pub mod pedigree;

pub use common::{ContractViolation, ReasonCodeId, SchemaVersion, Validate};
