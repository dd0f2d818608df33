//! lsquant: cross-sectional long/short research pipeline.
//!
//! Prices go through feature building, walk-forward model scoring, rank-based
//! portfolio construction and a cost-aware backtest. The pure pipeline lives
//! in [`domain`], port traits in [`ports`], file-backed implementations in
//! [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
