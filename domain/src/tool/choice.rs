//! Tool-choice mode
//!
//! Controls whether the model may pick tools freely, is forced to call one
//! specific tool, or is forbidden from calling tools during a turn.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// All enabled tools are offered; the model decides.
    #[default]
    Auto,
    /// No tool schema is sent and nothing is dispatched.
    None,
    /// Schema restricted to exactly this tool.
    Forced(String),
}

impl ToolChoice {
    pub fn forced(name: impl Into<String>) -> Self {
        ToolChoice::Forced(name.into())
    }

    /// Mode to apply for a given round (0-based).
    ///
    /// A forced choice only binds the first round; afterwards the model is
    /// free to answer or pick any enabled tool.
    pub fn for_round(&self, round: usize) -> ToolChoice {
        match self {
            ToolChoice::Forced(_) if round > 0 => ToolChoice::Auto,
            other => other.clone(),
        }
    }

    pub fn forced_name(&self) -> Option<&str> {
        match self {
            ToolChoice::Forced(name) => Some(name),
            _ => None,
        }
    }

    pub fn allows_tools(&self) -> bool {
        !matches!(self, ToolChoice::None)
    }
}

impl fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolChoice::Auto => write!(f, "auto"),
            ToolChoice::None => write!(f, "none"),
            ToolChoice::Forced(name) => write!(f, "forced:{}", name),
        }
    }
}

impl FromStr for ToolChoice {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "auto" | "" => Ok(ToolChoice::Auto),
            "none" => Ok(ToolChoice::None),
            _ => match trimmed.split_once(':') {
                Some((prefix, name)) if prefix.eq_ignore_ascii_case("forced") => {
                    let name = name.trim();
                    if name.is_empty() {
                        Err(DomainError::InvalidToolChoice(s.to_string()))
                    } else {
                        Ok(ToolChoice::Forced(name.to_string()))
                    }
                }
                _ => Err(DomainError::InvalidToolChoice(s.to_string())),
            },
        }
    }
}

impl Serialize for ToolChoice {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ToolChoice {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("auto".parse::<ToolChoice>().unwrap(), ToolChoice::Auto);
        assert_eq!("NONE".parse::<ToolChoice>().unwrap(), ToolChoice::None);
        assert_eq!(
            "forced:calculator".parse::<ToolChoice>().unwrap(),
            ToolChoice::forced("calculator")
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("sometimes".parse::<ToolChoice>().is_err());
        assert!("forced:".parse::<ToolChoice>().is_err());
    }

    #[test]
    fn test_forced_applies_to_first_round_only() {
        let choice = ToolChoice::forced("calculator");
        assert_eq!(choice.for_round(0), ToolChoice::forced("calculator"));
        assert_eq!(choice.for_round(1), ToolChoice::Auto);
        assert_eq!(ToolChoice::None.for_round(3), ToolChoice::None);
    }

    #[test]
    fn test_display_round_trips_through_serde() {
        let choice = ToolChoice::forced("gmail__search");
        let json = serde_json::to_string(&choice).unwrap();
        assert_eq!(json, "\"forced:gmail__search\"");
        let back: ToolChoice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, choice);
    }
}
