//! Fee calculation and display surface

pub mod calculator;
pub mod display;
pub mod estimator;
