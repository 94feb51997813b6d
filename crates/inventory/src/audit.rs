use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockella_core::{AuditEntryId, DomainError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuditAction {
    Create,
    Update,
    Configure,
    Delete,
}

impl AuditAction {
    pub const ALL: [AuditAction; 4] = [
        AuditAction::Create,
        AuditAction::Update,
        AuditAction::Configure,
        AuditAction::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "Create",
            AuditAction::Update => "Update",
            AuditAction::Configure => "Configure",
            AuditAction::Delete => "Delete",
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DomainError::validation(format!("unknown audit action '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub user_id: UserId,
    pub action: AuditAction,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(user_id: UserId, action: AuditAction, detail: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: AuditEntryId::new(),
            user_id,
            action,
            detail: detail.into(),
            recorded_at: now,
        }
    }
}

/// Totals over the audit log. Every action kind is present, zero or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub total: u64,
    pub by_action: BTreeMap<AuditAction, u64>,
}

impl AuditSummary {
    pub fn from_counts(counts: impl IntoIterator<Item = (AuditAction, u64)>) -> Self {
        let mut by_action: BTreeMap<AuditAction, u64> =
            AuditAction::ALL.into_iter().map(|a| (a, 0)).collect();
        for (action, n) in counts {
            *by_action.entry(action).or_insert(0) += n;
        }
        let total = by_action.values().sum();
        Self { total, by_action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_fills_missing_actions_with_zero() {
        let s = AuditSummary::from_counts([(AuditAction::Update, 3), (AuditAction::Delete, 1)]);
        assert_eq!(s.total, 4);
        assert_eq!(s.by_action[&AuditAction::Create], 0);
        assert_eq!(s.by_action[&AuditAction::Update], 3);
        assert_eq!(s.by_action.len(), 4);
    }

    #[test]
    fn action_parses_case_insensitively() {
        assert_eq!("configure".parse::<AuditAction>().unwrap(), AuditAction::Configure);
        assert!("Login".parse::<AuditAction>().is_err());
    }
}
