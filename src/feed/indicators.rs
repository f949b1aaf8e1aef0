//! Donchian channel and ATR over a bar stream.

use super::data::Bar;
use crate::strategy::MarketUpdate;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Incremental channel/volatility indicator feeding the strategy.
#[derive(Debug, Clone)]
pub struct ChannelIndicator {
    donchian_period: usize,
    atr_period: usize,
    window: VecDeque<(Decimal, Decimal)>,
    atr: Decimal,
    prev_close: Option<Decimal>,
    bars: usize,
}

impl ChannelIndicator {
    pub fn new(donchian_period: usize, atr_period: usize) -> Self {
        Self {
            donchian_period: donchian_period.max(1),
            atr_period: atr_period.max(1),
            window: VecDeque::with_capacity(donchian_period.max(1)),
            atr: Decimal::ZERO,
            prev_close: None,
            bars: 0,
        }
    }

    /// Fold in one bar and produce the market update for it.
    pub fn next(&mut self, bar: &Bar) -> MarketUpdate {
        if self.window.len() == self.donchian_period {
            self.window.pop_front();
        }
        self.window.push_back((bar.high, bar.low));

        let upper = self
            .window
            .iter()
            .map(|(high, _)| *high)
            .max()
            .unwrap_or(bar.high);
        let lower = self
            .window
            .iter()
            .map(|(_, low)| *low)
            .min()
            .unwrap_or(bar.low);

        let true_range = match self.prev_close {
            Some(prev) => (bar.high - bar.low)
                .max((bar.high - prev).abs())
                .max((bar.low - prev).abs()),
            None => bar.high - bar.low,
        };
        self.bars += 1;
        let n = Decimal::from(self.bars.min(self.atr_period));
        self.atr = ((n - Decimal::ONE) * self.atr + true_range) / n;
        self.prev_close = Some(bar.close);

        MarketUpdate {
            upper,
            mean: (upper + lower) / Decimal::TWO,
            lower,
            close: bar.close,
            atr: self.atr,
            tick_size: bar.tick_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bar(high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open: close,
            high,
            low,
            close,
            tick_size: dec!(0.25),
        }
    }

    #[test]
    fn test_channel_window() {
        let mut indicator = ChannelIndicator::new(2, 9);

        let update = indicator.next(&bar(dec!(102), dec!(98), dec!(100)));
        assert_eq!(update.upper, dec!(102));
        assert_eq!(update.lower, dec!(98));
        assert_eq!(update.mean, dec!(100));

        indicator.next(&bar(dec!(104), dec!(99), dec!(103)));
        // First bar rolls out of the two-bar window
        let update = indicator.next(&bar(dec!(103), dec!(101), dec!(102)));
        assert_eq!(update.upper, dec!(104));
        assert_eq!(update.lower, dec!(99));
        assert_eq!(update.mean, dec!(101.5));
        assert_eq!(update.close, dec!(102));
        assert_eq!(update.tick_size, dec!(0.25));
    }

    #[test]
    fn test_atr_wilder_smoothing() {
        let mut indicator = ChannelIndicator::new(14, 2);

        // First bar: high - low
        assert_eq!(indicator.next(&bar(dec!(102), dec!(100), dec!(101))).atr, dec!(2));
        // TR = max(1, |104-101|, |103-101|) = 3, averaged over 2
        assert_eq!(indicator.next(&bar(dec!(104), dec!(103), dec!(103))).atr, dec!(2.5));
        // Period reached: (1 * 2.5 + 1) / 2
        assert_eq!(indicator.next(&bar(dec!(104), dec!(103), dec!(103.5))).atr, dec!(1.75));
    }
}
