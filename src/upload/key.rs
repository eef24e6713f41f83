use crate::config::KeyLayout;
use chrono::{DateTime, Utc};

pub const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Object key for an upload happening at `now`.
///
/// The timestamp is always rendered in UTC, so keys do not depend on the
/// host time zone. Deployments that relied on local-time keys will see the
/// offset shift once.
///
/// With [`KeyLayout::Flat`] two databases uploaded within the same second
/// share a key and the later upload wins.
pub fn storage_key(now: DateTime<Utc>, database: &str, layout: KeyLayout) -> String {
    let name = format!("backup_{}.sql", now.format(KEY_TIMESTAMP_FORMAT));
    match layout {
        KeyLayout::Flat => name,
        KeyLayout::PerDatabase => format!("{}/{}", database.replace('/', "_"), name),
    }
}

#[cfg(test)]
pub(crate) fn is_flat_key(key: &str) -> bool {
    let Some(stamp) = key
        .strip_prefix("backup_")
        .and_then(|rest| rest.strip_suffix(".sql"))
    else {
        return false;
    };
    chrono::NaiveDateTime::parse_from_str(stamp, KEY_TIMESTAMP_FORMAT).is_ok() && stamp.len() == 19
}
