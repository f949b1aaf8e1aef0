//! Historical bar loading for replay.
//!
//! Expected CSV format:
//! ```csv
//! timestamp,open,high,low,close,tick_size
//! 2024-01-02T14:30:00Z,4750.25,4752.00,4749.50,4751.75,0.25
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One OHLC bar of the traded instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub tick_size: Decimal,
}

/// Bars loaded from a CSV file, in file order.
#[derive(Debug, Clone)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Load bars from a CSV file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;

        Self::from_csv_content(&content)
    }

    /// Parse bars from CSV content.
    pub fn from_csv_content(content: &str) -> Result<Self> {
        let mut bars = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            // Skip header
            if line_num == 0 && line.starts_with("timestamp") {
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let bar = parse_bar(line)
                .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
            bars.push(bar);
        }

        if bars.is_empty() {
            anyhow::bail!("CSV file contains no data rows");
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

fn parse_bar(line: &str) -> Result<Bar> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 6 {
        anyhow::bail!(
            "Expected 6 columns (timestamp,open,high,low,close,tick_size), got {}",
            parts.len()
        );
    }

    let field = |idx: usize, name: &str| -> Result<Decimal> {
        parts[idx]
            .parse()
            .with_context(|| format!("Invalid {}: {}", name, parts[idx]))
    };

    let bar = Bar {
        timestamp: parts[0]
            .parse()
            .with_context(|| format!("Invalid timestamp: {}", parts[0]))?,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        tick_size: field(5, "tick_size")?,
    };

    anyhow::ensure!(bar.high >= bar.low, "high {} below low {}", bar.high, bar.low);
    anyhow::ensure!(bar.tick_size > Decimal::ZERO, "tick_size must be positive");
    Ok(bar)
}
