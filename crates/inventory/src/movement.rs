use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use stockella_core::{MovementId, ProductId, UserId};

use crate::ledger::StockError;

/// Longest accepted movement reason, in characters.
pub const MAX_REASON_LEN: usize = 100;

/// Serialized as `"Inflow"` / `"Outflow"`; deserialized through [`FromStr`](core::str::FromStr),
/// so JSON bodies and query strings accept the same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MovementKind {
    Inflow,
    Outflow,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Inflow => "Inflow",
            MovementKind::Outflow => "Outflow",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementKind {
    type Err = StockError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("inflow") {
            Ok(MovementKind::Inflow)
        } else if trimmed.eq_ignore_ascii_case("outflow") {
            Ok(MovementKind::Outflow)
        } else {
            Err(StockError::InvalidKind(s.to_string()))
        }
    }
}

impl<'de> Deserialize<'de> for MovementKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: Option<String>,
    pub stock_before: i64,
    pub stock_after: i64,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(" inflow ".parse::<MovementKind>().unwrap(), MovementKind::Inflow);
        assert_eq!("OUTFLOW".parse::<MovementKind>().unwrap(), MovementKind::Outflow);
    }

    #[test]
    fn unknown_kind_is_reported_verbatim() {
        let err = "Transfer".parse::<MovementKind>().unwrap_err();
        assert_eq!(err, StockError::InvalidKind("Transfer".to_string()));
    }

    #[test]
    fn kind_serializes_as_its_name() {
        assert_eq!(serde_json::to_value(MovementKind::Outflow).unwrap(), "Outflow");
    }

    #[test]
    fn deserialize_accepts_the_same_spellings_as_parse() {
        let kind: MovementKind = serde_json::from_str("\"outflow\"").unwrap();
        assert_eq!(kind, MovementKind::Outflow);
        let kind: MovementKind = serde_json::from_str("\" INFLOW \"").unwrap();
        assert_eq!(kind, MovementKind::Inflow);
        assert!(serde_json::from_str::<MovementKind>("\"Transfer\"").is_err());
    }
}
