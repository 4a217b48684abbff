#![forbid(unsafe_code)]

pub mod advisory;
pub mod advisory_http;
pub mod compat_rules;
pub mod lineage;
