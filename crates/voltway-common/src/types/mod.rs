//! Core types for rental billing

pub mod fee;
pub mod rental;
