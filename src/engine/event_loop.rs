//! Single-consumer event loop around the strategy.
//!
//! Order callbacks and all other events arrive on separate channels. The
//! loop always drains pending order callbacks first, so fills produced by a
//! price are applied before the market update carrying that price.

use crate::exchange::{OrderGateway, OrderUpdate};
use crate::strategy::{DonchianStrategy, StrategyEvent};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub events: u64,
    pub order_updates: u64,
    pub faults: u64,
}

pub struct EventLoop<G: OrderGateway> {
    strategy: DonchianStrategy<G>,
    events: mpsc::UnboundedReceiver<StrategyEvent>,
    order_updates: mpsc::UnboundedReceiver<OrderUpdate>,
    stats: LoopStats,
}

impl<G: OrderGateway> EventLoop<G> {
    pub fn new(
        strategy: DonchianStrategy<G>,
        events: mpsc::UnboundedReceiver<StrategyEvent>,
        order_updates: mpsc::UnboundedReceiver<OrderUpdate>,
    ) -> Self {
        Self {
            strategy,
            events,
            order_updates,
            stats: LoopStats::default(),
        }
    }

    /// Run until `Shutdown` or until every event sender is dropped.
    ///
    /// Returns the strategy so callers can inspect its final state.
    pub async fn run(mut self) -> (DonchianStrategy<G>, LoopStats) {
        info!("Event loop started");

        loop {
            let event = tokio::select! {
                biased;
                Some(update) = self.order_updates.recv() => StrategyEvent::Order(update),
                next = self.events.recv() => match next {
                    Some(event) => event,
                    None => {
                        info!("Event channel closed");
                        break;
                    }
                },
            };

            let shutdown = matches!(event, StrategyEvent::Shutdown);
            self.dispatch(event).await;
            if shutdown {
                break;
            }
        }

        // Settle callbacks produced by the final cancels and exits
        while let Ok(update) = self.order_updates.try_recv() {
            self.dispatch(StrategyEvent::Order(update)).await;
        }

        info!(
            events = self.stats.events,
            order_updates = self.stats.order_updates,
            faults = self.stats.faults,
            "Event loop stopped"
        );
        (self.strategy, self.stats)
    }

    async fn dispatch(&mut self, event: StrategyEvent) {
        if matches!(event, StrategyEvent::Order(_)) {
            self.stats.order_updates += 1;
        } else {
            self.stats.events += 1;
        }
        debug!(?event, "Handling event");

        // A failed cycle is logged and skipped; the next event runs normally
        if let Err(e) = self.strategy.handle_event(event).await {
            self.stats.faults += 1;
            error!(error = %format!("{:#}", e), "Update cycle skipped");
        }
    }
}
