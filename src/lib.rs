//! # Donchian Desk
//!
//! Decision-and-order core of a discretionary-assisted Donchian channel
//! strategy: six armable entry slots, ATR-scaled OCO brackets, and a
//! position lifecycle driven by asynchronous order callbacks.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Order gateway seam and the paper trading gateway
//! - `strategy`: Stability filter, slots, brackets, lifecycle, commands
//! - `engine`: Event loop and paper replay driver
//! - `feed`: CSV bars, Donchian channel and ATR
//! - `panel`: Console rendering of the control panel
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod engine;
pub mod exchange;
pub mod feed;
pub mod panel;
pub mod strategy;
pub mod utils;

pub use config::Config;
