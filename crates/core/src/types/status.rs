//! Risk levels reported by the analysis backend.
//!
//! The backend is supposed to report one of `GREEN`, `YELLOW` or `RED`, but
//! users that were never analysed come back as `"UNKNOWN"` or `null`, and
//! nothing stops a future backend from inventing new values. [`RiskStatus`]
//! folds every value that is not one of the three levels into
//! [`RiskStatus::Unknown`] instead of failing to decode.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the three risk levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Low risk.
    Green,
    /// Moderate risk.
    Yellow,
    /// High risk.
    Red,
}

impl RiskLevel {
    /// All levels from lowest to highest risk.
    pub const ALL: [Self; 3] = [Self::Green, Self::Yellow, Self::Red];

    /// Wire name (`GREEN`, `YELLOW`, `RED`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Red => "RED",
        }
    }

    /// Parse a wire name. Matching is exact, as the backend emits uppercase.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "GREEN" => Some(Self::Green),
            "YELLOW" => Some(Self::Yellow),
            "RED" => Some(Self::Red),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A risk status that may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RiskStatus {
    /// A recognised risk level.
    Level(RiskLevel),
    /// Missing, `UNKNOWN`, or any unrecognised value.
    #[default]
    Unknown,
}

/// Presentation tone for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusTone {
    Emerald,
    Amber,
    Rose,
    /// Neutral tone for unknown statuses.
    Slate,
}

impl StatusTone {
    /// Tone name as used by the dashboards' palette.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emerald => "emerald",
            Self::Amber => "amber",
            Self::Rose => "rose",
            Self::Slate => "slate",
        }
    }
}

impl RiskStatus {
    /// Interpret a raw wire value.
    #[must_use]
    pub fn from_wire(value: Option<&str>) -> Self {
        value
            .and_then(RiskLevel::from_wire)
            .map_or(Self::Unknown, Self::Level)
    }

    /// The level, if known.
    #[must_use]
    pub const fn level(self) -> Option<RiskLevel> {
        match self {
            Self::Level(level) => Some(level),
            Self::Unknown => None,
        }
    }

    /// Whether this status is exactly `level`. Unknown never matches.
    #[must_use]
    pub fn is(self, level: RiskLevel) -> bool {
        self.level() == Some(level)
    }

    /// Wire name, `UNKNOWN` for the unknown bucket.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Level(level) => level.as_str(),
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Badge tone for this status.
    #[must_use]
    pub const fn tone(self) -> StatusTone {
        match self {
            Self::Level(RiskLevel::Green) => StatusTone::Emerald,
            Self::Level(RiskLevel::Yellow) => StatusTone::Amber,
            Self::Level(RiskLevel::Red) => StatusTone::Rose,
            Self::Unknown => StatusTone::Slate,
        }
    }
}

impl From<RiskLevel> for RiskStatus {
    fn from(level: RiskLevel) -> Self {
        Self::Level(level)
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RiskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accept any JSON value; anything that is not a known level string
        // lands in the unknown bucket.
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(Self::from_wire(raw.as_ref().and_then(serde_json::Value::as_str)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels_decode() {
        for level in RiskLevel::ALL {
            let json = format!("\"{level}\"");
            let status: RiskStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, RiskStatus::Level(level));
        }
    }

    #[test]
    fn test_unknown_values_do_not_fail() {
        for json in ["\"UNKNOWN\"", "null", "\"red\"", "\"PURPLE\"", "7", "{}"] {
            let status: RiskStatus = serde_json::from_str(json).unwrap();
            assert_eq!(status, RiskStatus::Unknown, "input {json}");
        }
    }

    #[test]
    fn test_missing_field_defaults_to_unknown() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default)]
            status: RiskStatus,
        }
        let row: Row = serde_json::from_str("{}").unwrap();
        assert_eq!(row.status, RiskStatus::Unknown);
    }

    #[test]
    fn test_tone_mapping() {
        assert_eq!(RiskStatus::from(RiskLevel::Green).tone(), StatusTone::Emerald);
        assert_eq!(RiskStatus::from(RiskLevel::Yellow).tone(), StatusTone::Amber);
        assert_eq!(RiskStatus::from(RiskLevel::Red).tone(), StatusTone::Rose);
        assert_eq!(RiskStatus::Unknown.tone(), StatusTone::Slate);
    }

    #[test]
    fn test_is_never_matches_unknown() {
        for level in RiskLevel::ALL {
            assert!(!RiskStatus::Unknown.is(level));
        }
        assert!(RiskStatus::Level(RiskLevel::Red).is(RiskLevel::Red));
    }

    #[test]
    fn test_serialize() {
        assert_eq!(
            serde_json::to_string(&RiskStatus::Level(RiskLevel::Yellow)).unwrap(),
            "\"YELLOW\""
        );
        assert_eq!(
            serde_json::to_string(&RiskStatus::Unknown).unwrap(),
            "\"UNKNOWN\""
        );
    }
}
