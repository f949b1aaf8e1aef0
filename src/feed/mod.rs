//! Market data source: CSV bars and the indicators derived from them.

mod data;
mod indicators;

pub use data::{Bar, BarSeries};
pub use indicators::ChannelIndicator;
