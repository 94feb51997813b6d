//! Read-side query shapes shared by every store adapter.
//!
//! The `matches` helpers are the reference semantics; the in-memory store
//! uses them directly and the Postgres store mirrors them in SQL.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockella_core::{CategoryId, ProductId, UserId};

use crate::alert::{Alert, AlertKind};
use crate::audit::{AuditAction, AuditEntry};
use crate::movement::{Movement, MovementKind};
use crate::product::Product;

pub const DEFAULT_PAGE_LIMIT: u32 = 9;
pub const DEFAULT_USER_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Days covered by the dashboard's inflow/outflow series, today included.
pub const WEEKLY_SERIES_DAYS: u64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    pub page: PageRequest,
}

impl ProductQuery {
    pub fn matches(&self, product: &Product) -> bool {
        let by_name = match search_term(&self.search) {
            Some(needle) => contains_ignore_case(&product.name, needle),
            None => true,
        };
        by_name && self.category.is_none_or(|c| product.category_id == Some(c))
    }
}

/// Search over user name or email; newest account first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub search: Option<String>,
    pub page: PageRequest,
}

impl UserQuery {
    pub fn matches(&self, name: &str, email: &str) -> bool {
        match search_term(&self.search) {
            Some(needle) => contains_ignore_case(name, needle) || contains_ignore_case(email, needle),
            None => true,
        }
    }
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: PageRequest::with_default_limit(None, None, DEFAULT_USER_PAGE_LIMIT),
        }
    }
}

/// Normalized pagination: `page >= 1`, `1 <= limit <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self::with_default_limit(page, limit, DEFAULT_PAGE_LIMIT)
    }

    pub fn with_default_limit(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u64,
    pub pages: u64,
    pub page: u32,
    pub limit: u32,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, total: u64, data: Vec<T>) -> Self {
        let limit = u64::from(request.limit());
        Self {
            total,
            pages: total.div_ceil(limit).max(1),
            page: request.page(),
            limit: request.limit(),
            data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub kind: Option<MovementKind>,
    pub product_id: Option<ProductId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MovementFilter {
    pub fn matches(&self, m: &Movement) -> bool {
        self.kind.is_none_or(|k| k == m.kind)
            && self.product_id.is_none_or(|p| p == m.product_id)
            && self.from.is_none_or(|from| m.occurred_at >= from)
            && self.to.is_none_or(|to| m.occurred_at <= to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub kind: Option<AlertKind>,
    pub acknowledged: Option<bool>,
}

impl AlertFilter {
    pub fn matches(&self, a: &Alert) -> bool {
        self.kind.is_none_or(|k| k == a.kind) && self.acknowledged.is_none_or(|ack| ack == a.acknowledged)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub user_id: Option<UserId>,
    pub action: Option<AuditAction>,
    pub detail: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, e: &AuditEntry) -> bool {
        self.user_id.is_none_or(|u| u == e.user_id)
            && self.action.is_none_or(|a| a == e.action)
            && self
                .detail
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&e.detail, needle))
    }
}

/// Headline counters, stock distribution and the recent movement series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub active_products: u64,
    pub active_users: u64,
    pub unacknowledged_alerts: u64,
    pub movements_today: u64,
    pub out_of_stock: u64,
    pub low_stock: u64,
    /// Products with `stock > 0`.
    pub in_stock: u64,
    /// Largest total first.
    pub stock_by_category: Vec<CategoryStock>,
    /// Oldest day first; always [`WEEKLY_SERIES_DAYS`] entries.
    pub weekly_movements: Vec<DailyMovements>,
}

/// Units on hand per category; `category_id` is `None` for uncategorized stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStock {
    pub category_id: Option<CategoryId>,
    pub category: String,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMovements {
    pub day: NaiveDate,
    pub inflow: i64,
    pub outflow: i64,
}

/// First instant of the series that ends on `today`.
pub fn weekly_series_start(today: DateTime<Utc>) -> DateTime<Utc> {
    today
        .date_naive()
        .checked_sub_days(Days::new(WEEKLY_SERIES_DAYS - 1))
        .unwrap_or(today.date_naive())
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
}

/// Lay per-day totals onto the fixed window ending on `today`; days without
/// movements are zero and totals outside the window are ignored.
pub fn weekly_series(
    today: NaiveDate,
    totals: impl IntoIterator<Item = (NaiveDate, MovementKind, i64)>,
) -> Vec<DailyMovements> {
    let mut series: Vec<DailyMovements> = (0..WEEKLY_SERIES_DAYS)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|day| DailyMovements {
            day,
            inflow: 0,
            outflow: 0,
        })
        .collect();
    let index: HashMap<NaiveDate, usize> = series.iter().enumerate().map(|(i, d)| (d.day, i)).collect();
    for (day, kind, quantity) in totals {
        if let Some(&i) = index.get(&day) {
            match kind {
                MovementKind::Inflow => series[i].inflow += quantity,
                MovementKind::Outflow => series[i].outflow += quantity,
            }
        }
    }
    series
}

/// Largest total first, ties by name.
pub fn rank_category_stock(mut rows: Vec<CategoryStock>) -> Vec<CategoryStock> {
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    rows
}

fn search_term(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use stockella_core::MovementId;

    use super::*;

    #[test]
    fn page_request_defaults_and_clamps() {
        let d = PageRequest::default();
        assert_eq!((d.page(), d.limit()), (1, DEFAULT_PAGE_LIMIT));

        let r = PageRequest::new(Some(0), Some(1000));
        assert_eq!((r.page(), r.limit()), (1, MAX_PAGE_LIMIT));

        let r = PageRequest::new(Some(3), Some(0));
        assert_eq!((r.page(), r.limit(), r.offset()), (3, 1, 2));
    }

    #[test]
    fn empty_page_still_reports_one_page() {
        let p: Page<()> = Page::new(PageRequest::default(), 0, Vec::new());
        assert_eq!(p.pages, 1);

        let p: Page<()> = Page::new(PageRequest::new(None, Some(9)), 19, Vec::new());
        assert_eq!(p.pages, 3);
    }

    fn movement(kind: MovementKind, at: DateTime<Utc>) -> Movement {
        Movement {
            id: MovementId::new(),
            product_id: ProductId::new(),
            user_id: UserId::new(),
            kind,
            quantity: 1,
            reason: None,
            stock_before: 1,
            stock_after: 0,
            occurred_at: at,
        }
    }

    #[test]
    fn movement_range_is_inclusive() {
        let now = Utc::now();
        let m = movement(MovementKind::Outflow, now);
        let f = MovementFilter {
            from: Some(now),
            to: Some(now),
            ..Default::default()
        };
        assert!(f.matches(&m));

        let f = MovementFilter {
            from: Some(now + Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!f.matches(&m));

        let f = MovementFilter {
            kind: Some(MovementKind::Inflow),
            ..Default::default()
        };
        assert!(!f.matches(&m));
    }

    #[test]
    fn audit_detail_search_ignores_case() {
        let e = AuditEntry::new(UserId::new(), AuditAction::Update, "Outflow on 'Widget': 10 → 7", Utc::now());
        let f = AuditFilter {
            detail: Some("widget".into()),
            ..Default::default()
        };
        assert!(f.matches(&e));
    }

    #[test]
    fn user_search_covers_name_and_email() {
        let q = UserQuery {
            search: Some(" ACME ".into()),
            ..UserQuery::default()
        };
        assert!(q.matches("Ana", "ana@acme.io"));
        assert!(q.matches("Acme bot", "bot@example.com"));
        assert!(!q.matches("Ana", "ana@example.com"));
        assert_eq!(UserQuery::default().page.limit(), DEFAULT_USER_PAGE_LIMIT);
    }

    #[test]
    fn weekly_series_fills_gaps_and_drops_out_of_window_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let series = weekly_series(
            today,
            [
                (day(10), MovementKind::Inflow, 5),
                (day(10), MovementKind::Inflow, 2),
                (day(8), MovementKind::Outflow, 3),
                (day(3), MovementKind::Inflow, 99),
            ],
        );
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].day, day(4));
        assert_eq!(series[6], DailyMovements { day: day(10), inflow: 7, outflow: 0 });
        assert_eq!(series[4].outflow, 3);
        assert_eq!(series.iter().map(|d| d.inflow).sum::<i64>(), 7);
    }

    #[test]
    fn weekly_window_starts_six_days_back_at_midnight() {
        let now = "2024-03-10T15:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let start = weekly_series_start(now);
        assert_eq!(start, "2024-03-04T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn category_stock_is_ranked_by_total() {
        let row = |name: &str, total| CategoryStock {
            category_id: None,
            category: name.into(),
            total,
        };
        let ranked = rank_category_stock(vec![row("b", 5), row("a", 5), row("c", 9)]);
        let names: Vec<_> = ranked.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }
}
