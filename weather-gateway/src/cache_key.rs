use chrono::NaiveDate;
use std::fmt;

use crate::validator::WeatherQuery;

/// Canonical lookup key: normalized location plus the UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// One upstream fetch covers a whole day, so the time of day is dropped.
    pub fn from_query(query: &WeatherQuery) -> Self {
        Self::new(&query.location, query.date.date_naive())
    }

    pub fn new(location: &str, day: NaiveDate) -> Self {
        Self(format!(
            "{}|{}",
            normalize_location(location),
            day.format("%Y-%m-%d")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, collapse whitespace runs, and drop whitespace around commas.
fn normalize_location(location: &str) -> String {
    location
        .to_lowercase()
        .split(',')
        .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn query(location: &str, date: DateTime<Utc>) -> WeatherQuery {
        WeatherQuery {
            location: location.to_string(),
            date,
        }
    }

    #[test]
    fn spacing_and_case_variants_share_a_key() {
        let date = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let expected = CacheKey::from_query(&query("Noblesville,IN", date));

        for variant in [
            "Noblesville, IN",
            "  noblesville ,  in ",
            "NOBLESVILLE,\tIN",
            "Noblesville,,IN",
        ] {
            assert_eq!(CacheKey::from_query(&query(variant, date)), expected, "{variant:?}");
        }
        assert_eq!(expected.as_str(), "noblesville,in|2025-03-14");
    }

    #[test]
    fn internal_whitespace_collapses_to_one_space() {
        assert_eq!(normalize_location("  New    York \n City "), "new york city");
    }

    #[test]
    fn time_of_day_is_ignored_but_day_is_not() {
        let morning = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2025, 3, 14, 23, 59, 59).unwrap();
        let next_day = Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap();

        let key = CacheKey::from_query(&query("Paris", morning));
        assert_eq!(CacheKey::from_query(&query("Paris", night)), key);
        assert_ne!(CacheKey::from_query(&query("Paris", next_day)), key);
    }

    #[test]
    fn different_places_differ() {
        let date = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        assert_ne!(
            CacheKey::from_query(&query("Paris", date)),
            CacheKey::from_query(&query("Paris, TX", date))
        );
    }
}
