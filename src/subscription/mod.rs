mod assigner;
mod calendar;
#[cfg(test)]
pub(crate) mod memory;
mod snapshot;
mod store;

pub use assigner::{Assignment, SubscriptionAssigner, SubscriptionError};
pub use snapshot::SubscriptionSnapshot;
pub use store::{AccountStore, PlanCatalog};
