use serde::Serialize;

pub const DEFAULT_LIMIT: i64 = 25;
pub const MAX_LIMIT: i64 = 100;
/// Keeps `(page - 1) * limit` and the next-page arithmetic inside `i64`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT - 1;

/// Resolved `page`/`limit` query pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub limit: i64,
}

impl PageWindow {
    /// Page defaults to 1, limit to 25 and is capped at 100.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn links(&self, total: i64) -> PageLinks {
        PageLinks {
            next: (self.offset().saturating_add(self.limit) < total).then(|| PageRef {
                page: self.page + 1,
                limit: self.limit,
            }),
            prev: (self.page > 1).then(|| PageRef {
                page: self.page - 1,
                limit: self.limit,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

/// List envelope: `{ success, count, total, pagination, data }`.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub pagination: PageLinks,
    pub data: Vec<T>,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(window: PageWindow, total: i64, data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            total,
            pagination: window.links(total),
            data,
        }
    }
}
