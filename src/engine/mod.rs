//! Runtime plumbing: the strategy event loop and the paper replay driver.

mod event_loop;
mod replay;

pub use event_loop::{EventLoop, LoopStats};
pub use replay::{ReplayDriver, ReplaySummary};
