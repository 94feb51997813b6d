use chrono::{DateTime, Utc};

use stockella_inventory::DashboardSummary;

use crate::error::LedgerError;
use crate::ledger_engine::LedgerEngine;

impl LedgerEngine {
    /// Open to any authenticated caller. "Today" is the current UTC day.
    pub async fn dashboard(&self) -> Result<DashboardSummary, LedgerError> {
        Ok(self.store.dashboard(start_of_utc_day(Utc::now())).await?)
    }
}

fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}
