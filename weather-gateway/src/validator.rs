//! Request parameter validation.
//!
//! Runs before any cache or upstream work. Location is checked first, so a
//! request missing both parameters reports an invalid location.

use chrono::{DateTime, Duration, Utc};
use common::errors::ValidationError;

const MAX_LOCATION_LEN: usize = 256;

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    pub location: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    /// When set, dates farther than this from "now" in either direction are rejected.
    max_offset: Option<Duration>,
}

impl Validator {
    pub fn new(max_offset: Option<Duration>) -> Self {
        Self { max_offset }
    }

    pub fn validate(
        &self,
        raw_location: Option<&str>,
        raw_date: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<WeatherQuery, ValidationError> {
        let location = validate_location(raw_location)?;
        let date = self.validate_date(raw_date, now)?;

        Ok(WeatherQuery { location, date })
    }

    fn validate_date(
        &self,
        raw: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        let date = raw
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .and_then(parse_timestamp)
            .ok_or(ValidationError::InvalidDate)?;

        if let Some(max_offset) = self.max_offset
            && (date - now).abs() > max_offset
        {
            return Err(ValidationError::InvalidDate);
        }

        Ok(date)
    }
}

fn validate_location(raw: Option<&str>) -> Result<String, ValidationError> {
    let location = raw.map(str::trim).unwrap_or_default();

    if location.is_empty()
        || location.chars().count() > MAX_LOCATION_LEN
        || !location.chars().any(char::is_alphabetic)
    {
        return Err(ValidationError::InvalidLocation);
    }

    Ok(location.to_string())
}

/// Epoch milliseconds (as produced by `Date.now()`) or RFC 3339.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    #[test]
    fn missing_location_is_invalid_even_without_date() {
        let validator = Validator::default();
        assert_eq!(
            validator.validate(None, Some("1"), now()),
            Err(ValidationError::InvalidLocation)
        );
        assert_eq!(
            validator.validate(None, None, now()),
            Err(ValidationError::InvalidLocation)
        );
    }

    #[test]
    fn rejects_blank_or_non_alphabetic_locations() {
        let validator = Validator::default();
        for raw in ["", "   ", "12345", ", ,", "-- 42 --"] {
            assert_eq!(
                validator.validate(Some(raw), Some("1"), now()),
                Err(ValidationError::InvalidLocation),
                "{raw:?} should be rejected"
            );
        }

        let long = "a".repeat(MAX_LOCATION_LEN + 1);
        assert_eq!(
            validator.validate(Some(long.as_str()), Some("1"), now()),
            Err(ValidationError::InvalidLocation)
        );
    }

    #[test]
    fn missing_or_garbage_date_is_invalid() {
        let validator = Validator::default();
        for raw in [None, Some(""), Some("tomorrow"), Some("12.5"), Some("2024-13-01")] {
            assert_eq!(
                validator.validate(Some("Noblesville,IN"), raw, now()),
                Err(ValidationError::InvalidDate),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn out_of_range_epoch_is_invalid() {
        let validator = Validator::default();
        assert_eq!(
            validator.validate(Some("Paris"), Some(i64::MAX.to_string().as_str()), now()),
            Err(ValidationError::InvalidDate)
        );
    }

    #[test]
    fn accepts_epoch_millis_and_rfc3339() {
        let validator = Validator::default();

        let query = validator
            .validate(Some("  Noblesville, IN "), Some("1760000000000"), now())
            .unwrap();
        assert_eq!(query.location, "Noblesville, IN");
        assert_eq!(query.date, now());

        let query = validator
            .validate(Some("Paris"), Some("2025-10-09T08:53:20+00:00"), now())
            .unwrap();
        assert_eq!(query.date, now());

        assert!(validator.validate(Some("Paris"), Some("1"), now()).is_ok());
    }

    #[test]
    fn max_offset_bounds_dates_both_ways() {
        let validator = Validator::new(Some(Duration::days(7)));
        let ms = |d: DateTime<Utc>| d.timestamp_millis().to_string();

        let near = now() + Duration::days(6);
        let far_future = now() + Duration::days(8);
        let far_past = now() - Duration::days(8);

        assert!(validator.validate(Some("Oslo"), Some(ms(near).as_str()), now()).is_ok());
        assert_eq!(
            validator.validate(Some("Oslo"), Some(ms(far_future).as_str()), now()),
            Err(ValidationError::InvalidDate)
        );
        assert_eq!(
            validator.validate(Some("Oslo"), Some(ms(far_past).as_str()), now()),
            Err(ValidationError::InvalidDate)
        );
    }
}
