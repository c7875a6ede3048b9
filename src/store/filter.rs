use serde::Deserialize;
use time::Date;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

/// Raw query string for expense listings: `?year=2024&month=5&page=2&limit=20`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseQuery {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Year/month predicate plus a page window. The window is applied after the
/// date predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpenseFilter {
    pub year: i32,
    pub month: i32,
    pub limit: i64,
    pub offset: i64,
}

impl ExpenseFilter {
    /// Missing or non-positive year/month fall back to `today`.
    pub fn from_query(q: &ExpenseQuery, today: Date) -> Self {
        let year = q.year.filter(|y| *y > 0).unwrap_or(today.year());
        let month = q.month.filter(|m| *m > 0).unwrap_or(u8::from(today.month()) as i32);
        let limit = q
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        let page = q.page.filter(|p| *p > 0).unwrap_or(1);
        Self {
            year,
            month,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    pub fn for_month(year: i32, month: i32) -> Self {
        Self {
            year,
            month,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn matches(&self, date: Date) -> bool {
        date.year() == self.year && u8::from(date.month()) as i32 == self.month
    }
}
