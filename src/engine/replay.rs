//! Replays CSV bars through the indicator and the paper gateway.
//!
//! The first `history_bars` rows are fed in historical mode; the host then
//! switches to live and the remaining rows drive paper fills.

use crate::exchange::PaperGateway;
use crate::feed::{Bar, ChannelIndicator};
use crate::strategy::{HostMode, StrategyEvent};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Outcome of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub bars: usize,
    pub historical_bars: usize,
    pub fills: usize,
}

pub struct ReplayDriver {
    bars: Vec<Bar>,
    indicator: ChannelIndicator,
    gateway: PaperGateway,
    events: mpsc::UnboundedSender<StrategyEvent>,
    history_bars: usize,
    interval: Duration,
}

impl ReplayDriver {
    pub fn new(
        bars: Vec<Bar>,
        indicator: ChannelIndicator,
        gateway: PaperGateway,
        events: mpsc::UnboundedSender<StrategyEvent>,
        history_bars: usize,
        interval: Duration,
    ) -> Self {
        Self {
            bars,
            indicator,
            gateway,
            events,
            history_bars,
            interval,
        }
    }

    /// Feed every bar, then leave the host live.
    pub async fn run(mut self) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary {
            bars: self.bars.len(),
            historical_bars: self.history_bars.min(self.bars.len()),
            fills: 0,
        };
        info!(
            bars = summary.bars,
            historical = summary.historical_bars,
            "Starting replay"
        );

        let bars = std::mem::take(&mut self.bars);
        for (i, bar) in bars.iter().enumerate() {
            if i == self.history_bars {
                self.send(StrategyEvent::ModeChanged(HostMode::Live))?;
            }

            let update = self.indicator.next(bar);
            // Price first: fills land in the order channel ahead of the update
            summary.fills += self.gateway.on_price(bar.close).await;
            self.send(StrategyEvent::Market(update))?;

            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
        }

        if self.history_bars >= bars.len() {
            self.send(StrategyEvent::ModeChanged(HostMode::Live))?;
        }

        info!(
            bars = summary.bars,
            fills = summary.fills,
            "Replay complete"
        );
        Ok(summary)
    }

    fn send(&self, event: StrategyEvent) -> Result<()> {
        self.events
            .send(event)
            .ok()
            .context("Strategy event loop is no longer running")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::BarSeries;
    use rust_decimal_macros::dec;

    const CSV: &str = "timestamp,open,high,low,close,tick_size
2024-01-02T14:30:00Z,100,101,99,100,0.25
2024-01-02T14:31:00Z,100,101,99,100.5,0.25
2024-01-02T14:32:00Z,100,101,99,99.5,0.25
";

    #[tokio::test]
    async fn test_replay_switches_to_live() {
        let (order_tx, _order_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let bars = BarSeries::from_csv_content(CSV).unwrap().into_bars();
        let driver = ReplayDriver::new(
            bars,
            ChannelIndicator::new(14, 9),
            PaperGateway::new(order_tx, true),
            event_tx,
            2,
            Duration::ZERO,
        );

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.bars, 3);
        assert_eq!(summary.historical_bars, 2);

        let mut events = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
        assert!(matches!(events[2], StrategyEvent::ModeChanged(HostMode::Live)));
        match &events[3] {
            StrategyEvent::Market(update) => {
                assert_eq!(update.close, dec!(99.5));
                assert_eq!(update.upper, dec!(101));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replay_all_history_ends_live() {
        let (order_tx, _order_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let bars = BarSeries::from_csv_content(CSV).unwrap().into_bars();
        let driver = ReplayDriver::new(
            bars,
            ChannelIndicator::new(14, 9),
            PaperGateway::new(order_tx, true),
            event_tx,
            10,
            Duration::ZERO,
        );

        driver.run().await.unwrap();

        let mut last = None;
        while let Ok(event) = event_rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(StrategyEvent::ModeChanged(HostMode::Live)));
    }

    #[tokio::test]
    async fn test_replay_fails_when_loop_is_gone() {
        let (order_tx, _order_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        drop(event_rx);
        let bars = BarSeries::from_csv_content(CSV).unwrap().into_bars();
        let driver = ReplayDriver::new(
            bars,
            ChannelIndicator::new(14, 9),
            PaperGateway::new(order_tx, true),
            event_tx,
            0,
            Duration::ZERO,
        );

        assert!(driver.run().await.is_err());
    }
}
