use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Subscription state embedded in an account.
///
/// Always built and written as a whole: an assignment replaces every field,
/// a removal resets every field. `end_date == None` means no expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    pub package_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub is_active: bool,
    pub is_lifetime: bool,
}

impl SubscriptionSnapshot {
    /// The unsubscribed state.
    pub fn empty() -> Self {
        Self {
            package_id: None,
            start_date: None,
            end_date: None,
            is_active: false,
            is_lifetime: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// Read-time expiry: the active flag is never flipped when `end_date` passes.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        match self.end_date {
            Some(end) => !self.is_lifetime && end < now,
            None => false,
        }
    }

    /// Active and not past its end date at `now`.
    pub fn is_current_at(&self, now: OffsetDateTime) -> bool {
        self.is_active && self.package_id.is_some() && !self.is_expired_at(now)
    }
}

impl Default for SubscriptionSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
