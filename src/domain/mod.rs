//! Core domain types and logic.

pub mod backtest;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod features;
pub mod metrics;
pub mod model;
pub mod panel;
pub mod pipeline;
pub mod portfolio;
pub mod walk_forward;
