pub mod store;

use chrono::{DateTime, SecondsFormat, Utc};

pub use store::Store;

/// Canonical stored timestamp: RFC3339, whole seconds, `Z` suffix.
///
/// Every time column uses this form so that string comparison in SQL orders
/// the same way as the instants do.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
