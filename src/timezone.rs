/// Store timezone resolution
/// Stores without an entry are assumed to be in Central time.

use chrono_tz::Tz;
use std::collections::HashMap;

use crate::error::StoreError;
use crate::model::StoreId;

pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// Parse an IANA zone name, ignoring surrounding whitespace
pub fn parse_zone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

/// Maps store ids to zone names over a borrowed timezone table
#[derive(Debug, Clone, Copy)]
pub struct TimezoneResolver<'a> {
    entries: &'a HashMap<StoreId, String>,
    default_zone: &'a str,
}

impl<'a> TimezoneResolver<'a> {
    pub fn new(entries: &'a HashMap<StoreId, String>, default_zone: &'a str) -> Self {
        Self {
            entries,
            default_zone,
        }
    }

    /// Zone name for a store. Blank entries count as missing.
    pub fn resolve(&self, store_id: &str) -> &'a str {
        match self.entries.get(store_id) {
            Some(zone) if !zone.trim().is_empty() => zone.trim(),
            _ => self.default_zone,
        }
    }

    pub fn zone(&self, store_id: &str) -> Result<Tz, StoreError> {
        let name = self.resolve(store_id);
        parse_zone(name).ok_or_else(|| StoreError::UnknownTimezone {
            store_id: store_id.to_string(),
            zone: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HashMap<StoreId, String> {
        let mut m = HashMap::new();
        m.insert("ny".to_string(), "America/New_York".to_string());
        m.insert("blank".to_string(), "   ".to_string());
        m.insert("bad".to_string(), "Mars/Olympus".to_string());
        m
    }

    #[test]
    fn test_resolve_known_store() {
        let entries = table();
        let resolver = TimezoneResolver::new(&entries, DEFAULT_TIMEZONE);
        assert_eq!(resolver.resolve("ny"), "America/New_York");
        assert_eq!(resolver.zone("ny"), Ok(chrono_tz::America::New_York));
    }

    #[test]
    fn test_resolve_unknown_store_uses_default() {
        let entries = table();
        let resolver = TimezoneResolver::new(&entries, DEFAULT_TIMEZONE);
        assert_eq!(resolver.resolve("nobody"), DEFAULT_TIMEZONE);
        assert_eq!(resolver.zone("nobody"), Ok(chrono_tz::America::Chicago));
    }

    #[test]
    fn test_blank_entry_uses_default() {
        let entries = table();
        let resolver = TimezoneResolver::new(&entries, DEFAULT_TIMEZONE);
        assert_eq!(resolver.resolve("blank"), DEFAULT_TIMEZONE);
    }

    #[test]
    fn test_invalid_explicit_zone_is_error() {
        let entries = table();
        let resolver = TimezoneResolver::new(&entries, DEFAULT_TIMEZONE);
        let err = resolver.zone("bad").unwrap_err();
        assert_eq!(
            err,
            StoreError::UnknownTimezone {
                store_id: "bad".to_string(),
                zone: "Mars/Olympus".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_zone() {
        assert_eq!(parse_zone(" Asia/Tokyo "), Some(chrono_tz::Asia::Tokyo));
        assert_eq!(parse_zone(""), None);
        assert_eq!(parse_zone("Not/AZone"), None);
    }
}
