//! `call_timestamp` rendering.

use std::time::SystemTime;

use callrelay_protocol::constants::{CALL_TIMESTAMP_FORMAT, CALL_TIMESTAMP_OFFSET_SECS};
use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Renders a file modification time as the backend's `call_timestamp`.
///
/// Wall-clock time in UTC-6 followed by a literal `Z`, e.g.
/// `2023-11-14T16:13:20Z` for `2023-11-14T22:13:20` UTC.
pub fn call_timestamp(modified: SystemTime) -> String {
    let offset = FixedOffset::east_opt(CALL_TIMESTAMP_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    DateTime::<Utc>::from(modified)
        .with_timezone(&offset)
        .format(CALL_TIMESTAMP_FORMAT)
        .to_string()
}
