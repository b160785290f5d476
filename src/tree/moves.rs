//! Move actions for reordering tree records.

use crate::core::error::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural move of a node relative to its siblings or a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "target", rename_all = "kebab-case")]
pub enum MoveAction {
    /// Swap with the previous sibling
    Up,
    /// Swap with the next sibling
    Down,
    /// Leave the parent and become its next sibling
    UpOut,
    /// Become the last child of the previous sibling
    DownIn,
    /// Become the next sibling of the target
    #[serde(rename = "move-after")]
    After(RecordId),
    /// Become the previous sibling of the target
    #[serde(rename = "move-before")]
    Before(RecordId),
    /// Become the first child of the target
    FirstChild(RecordId),
}

impl MoveAction {
    /// Parse an action keyword. `move-after`, `move-before` and
    /// `first-child` need a target.
    pub fn parse(action: &str, target: Option<RecordId>) -> Result<Self, String> {
        let needs_target = |make: fn(RecordId) -> MoveAction| {
            target
                .map(make)
                .ok_or_else(|| format!("action '{}' needs a target", action))
        };
        match action {
            "up" => Ok(MoveAction::Up),
            "down" => Ok(MoveAction::Down),
            "up-out" => Ok(MoveAction::UpOut),
            "down-in" => Ok(MoveAction::DownIn),
            "move-after" => needs_target(MoveAction::After),
            "move-before" => needs_target(MoveAction::Before),
            "first-child" => needs_target(MoveAction::FirstChild),
            other => Err(format!("unknown move action '{}'", other)),
        }
    }

    /// Action keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            MoveAction::Up => "up",
            MoveAction::Down => "down",
            MoveAction::UpOut => "up-out",
            MoveAction::DownIn => "down-in",
            MoveAction::After(_) => "move-after",
            MoveAction::Before(_) => "move-before",
            MoveAction::FirstChild(_) => "first-child",
        }
    }
}

impl fmt::Display for MoveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveAction::After(t) | MoveAction::Before(t) | MoveAction::FirstChild(t) => {
                write!(f, "{} {}", self.keyword(), t)
            }
            _ => write!(f, "{}", self.keyword()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(MoveAction::parse("up-out", None).unwrap(), MoveAction::UpOut);
        let target = RecordId::new();
        assert_eq!(
            MoveAction::parse("first-child", Some(target)).unwrap(),
            MoveAction::FirstChild(target)
        );
        assert!(MoveAction::parse("move-after", None).is_err());
        assert!(MoveAction::parse("sideways", None).is_err());
    }

    #[test]
    fn test_keyword_round_trip() {
        let target = RecordId::new();
        for action in [
            MoveAction::Up,
            MoveAction::DownIn,
            MoveAction::Before(target),
        ] {
            assert_eq!(MoveAction::parse(action.keyword(), Some(target)).unwrap(), action);
        }
    }
}
