//! Wire protocol for the microcontroller link.
//!
//! Text lines, newline-terminated:
//! - outbound: `CLASS:<CATEGORY_TOKEN>` with token in
//!   {QITA, CHUYU, KEHUISHOU, YOUHAI} (case-sensitive upper)
//! - inbound: `FULL:<TOKEN>` / `UNFULL:<TOKEN>` with token in
//!   {OTHER, KITCHEN, RECYCLABLE, HAZARDOUS}, and `DONE` (no payload)
//!
//! Unrecognized inbound lines are ignored by the caller.

use crate::category::TrashCategory;

/// Outbound sorting command for a category.
pub fn command_for(category: TrashCategory) -> String {
    format!("CLASS:{}", category.command_token())
}

/// Inbound signals from the microcontroller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundSignal {
    /// A bin reached capacity.
    Full(TrashCategory),
    /// A bin was emptied.
    Unfull(TrashCategory),
    /// The actuator finished moving. Logged only; completion stays on the
    /// fixed dwell timer.
    Done,
}

impl InboundSignal {
    /// Parse one line; `None` for anything unrecognized.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == "DONE" {
            return Some(InboundSignal::Done);
        }
        if let Some(token) = line.strip_prefix("FULL:") {
            return TrashCategory::from_status_token(token).map(InboundSignal::Full);
        }
        if let Some(token) = line.strip_prefix("UNFULL:") {
            return TrashCategory::from_status_token(token).map(InboundSignal::Unfull);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_pinyin_tokens() {
        assert_eq!(command_for(TrashCategory::Kitchen), "CLASS:CHUYU");
        assert_eq!(command_for(TrashCategory::Other), "CLASS:QITA");
        assert_eq!(command_for(TrashCategory::Recyclable), "CLASS:KEHUISHOU");
        assert_eq!(command_for(TrashCategory::Hazardous), "CLASS:YOUHAI");
    }

    #[test]
    fn parses_full_and_unfull_signals() {
        assert_eq!(
            InboundSignal::parse("FULL:HAZARDOUS"),
            Some(InboundSignal::Full(TrashCategory::Hazardous))
        );
        assert_eq!(
            InboundSignal::parse("UNFULL:KITCHEN\n"),
            Some(InboundSignal::Unfull(TrashCategory::Kitchen))
        );
        assert_eq!(InboundSignal::parse("DONE"), Some(InboundSignal::Done));
    }

    #[test]
    fn unknown_lines_are_ignored() {
        assert_eq!(InboundSignal::parse(""), None);
        assert_eq!(InboundSignal::parse("FULL:PAPER"), None);
        assert_eq!(InboundSignal::parse("full:KITCHEN"), None);
        assert_eq!(InboundSignal::parse("PING"), None);
    }
}
