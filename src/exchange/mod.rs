//! Order routing for the entry desk.
//!
//! ## Gateway
//! [`OrderGateway`] is the seam to the host's execution engine: submit,
//! cancel, position query. Outcomes are delivered later as [`OrderUpdate`]s.
//!
//! ## Paper
//! [`PaperGateway`] simulates the host for replays: resting orders are
//! matched against replayed prices and OCO groups are honoured.

pub mod paper;
mod traits;
mod types;

pub use paper::{PaperGateway, PaperStats};
#[cfg(test)]
pub use traits::MockOrderGateway;
pub use traits::{GatewayError, OrderGateway};
pub use types::*;
