#![forbid(unsafe_code)]

pub mod breeding_advice;
