//! The twelve slot commands and the operator console vocabulary.

use super::types::{Direction, Level, SlotKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Place or cancel one entry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    PlaceBuyUpper,
    PlaceSellUpper,
    PlaceBuyMean,
    PlaceSellMean,
    PlaceBuyLower,
    PlaceSellLower,
    CancelBuyUpper,
    CancelSellUpper,
    CancelBuyMean,
    CancelSellMean,
    CancelBuyLower,
    CancelSellLower,
}

impl Command {
    pub const ALL: [Command; 12] = [
        Command::PlaceBuyUpper,
        Command::PlaceSellUpper,
        Command::PlaceBuyMean,
        Command::PlaceSellMean,
        Command::PlaceBuyLower,
        Command::PlaceSellLower,
        Command::CancelBuyUpper,
        Command::CancelSellUpper,
        Command::CancelBuyMean,
        Command::CancelSellMean,
        Command::CancelBuyLower,
        Command::CancelSellLower,
    ];

    pub fn is_place(&self) -> bool {
        matches!(
            self,
            Command::PlaceBuyUpper
                | Command::PlaceSellUpper
                | Command::PlaceBuyMean
                | Command::PlaceSellMean
                | Command::PlaceBuyLower
                | Command::PlaceSellLower
        )
    }

    /// Slot the command operates on.
    pub fn slot(&self) -> SlotKey {
        use Direction::{Buy, Sell};
        use Level::{Lower, Mean, Upper};
        match self {
            Command::PlaceBuyUpper | Command::CancelBuyUpper => SlotKey::new(Buy, Upper),
            Command::PlaceSellUpper | Command::CancelSellUpper => SlotKey::new(Sell, Upper),
            Command::PlaceBuyMean | Command::CancelBuyMean => SlotKey::new(Buy, Mean),
            Command::PlaceSellMean | Command::CancelSellMean => SlotKey::new(Sell, Mean),
            Command::PlaceBuyLower | Command::CancelBuyLower => SlotKey::new(Buy, Lower),
            Command::PlaceSellLower | Command::CancelSellLower => SlotKey::new(Sell, Lower),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.is_place() { "Place" } else { "Cancel" };
        let key = self.slot();
        write!(f, "{}{}{}", verb, key.direction, key.level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Command::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCommand(wanted.to_string()))
    }
}

/// A line typed on the operator console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorInput {
    Slot(Command),
    Close,
    CancelAll,
    Status,
}

impl FromStr for OperatorInput {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(OperatorInput::Close),
            "cancel-all" | "cancelall" => Ok(OperatorInput::CancelAll),
            "status" => Ok(OperatorInput::Status),
            _ => s.parse().map(OperatorInput::Slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_slots() {
        let (place, cancel) = Command::ALL.split_at(6);
        for (i, key) in SlotKey::ALL.into_iter().enumerate() {
            assert_eq!(place[i].slot(), key);
            assert!(place[i].is_place());
            assert_eq!(cancel[i].slot(), key);
            assert!(!cancel[i].is_place());
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("PlaceBuyUpper".parse::<Command>(), Ok(Command::PlaceBuyUpper));
        assert_eq!("cancelselllower".parse::<Command>(), Ok(Command::CancelSellLower));
        assert_eq!(Command::PlaceSellMean.to_string(), "PlaceSellMean");
        assert!("PlaceBuySideways".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_operator_input() {
        assert_eq!("close".parse::<OperatorInput>(), Ok(OperatorInput::Close));
        assert_eq!(" Cancel-All ".parse::<OperatorInput>(), Ok(OperatorInput::CancelAll));
        assert_eq!("status".parse::<OperatorInput>(), Ok(OperatorInput::Status));
        assert_eq!(
            "PlaceBuyMean".parse::<OperatorInput>(),
            Ok(OperatorInput::Slot(Command::PlaceBuyMean))
        );
        assert!("".parse::<OperatorInput>().is_err());
    }
}
