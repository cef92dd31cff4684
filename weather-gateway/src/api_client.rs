use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use common::errors::FetchError;
use common::http_client::HttpClient;
use common::models::HourlyRecord;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::cache::{DailyForecast, HOURS_PER_DAY};
use crate::validator::WeatherQuery;

const HOURLY_FIELDS: &str =
    "temperature_2m,uv_index,weather_code,precipitation_probability,precipitation,visibility";

/// Source of a day's hourly forecast. Makes one upstream attempt per call.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch(&self, query: &WeatherQuery) -> Result<DailyForecast, FetchError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Clone, Deserialize)]
struct Place {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    admin1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Hourly,
}

#[derive(Debug, Deserialize)]
struct Hourly {
    time: Vec<i64>,
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    uv_index: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<u32>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    visibility: Vec<Option<f64>>,
}

pub struct OpenMeteoClient {
    http_client: HttpClient,
    geocoding_url: String,
    forecast_url: String,
    api_key: Option<String>,
}

impl OpenMeteoClient {
    pub fn new(
        geocoding_url: String,
        forecast_url: String,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http_client: HttpClient::new(timeout_secs),
            geocoding_url,
            forecast_url,
            api_key,
        }
    }

    fn with_api_key(&self, url: String) -> String {
        match &self.api_key {
            Some(key) => format!("{}&apikey={}", url, urlencoding::encode(key)),
            None => url,
        }
    }

    /// First comma segment is the place name; the rest narrow down the match.
    async fn resolve_place(&self, location: &str) -> Result<Place, FetchError> {
        let mut segments = location
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty());
        let name = segments
            .next()
            .ok_or_else(|| FetchError::invalid_response("location has no place name"))?;
        let hints: Vec<String> = segments.map(str::to_lowercase).collect();

        let url = self.with_api_key(format!(
            "{}?name={}&count=10&language=en&format=json",
            self.geocoding_url,
            urlencoding::encode(name)
        ));

        let response: GeocodingResponse = self.http_client.get_json(&url).await?;

        pick_place(response.results, &hints).ok_or_else(|| {
            FetchError::invalid_response(format!("no place found for '{}'", location))
        })
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoClient {
    #[instrument(skip(self, query), fields(location = %query.location, date = %query.date))]
    async fn fetch(&self, query: &WeatherQuery) -> Result<DailyForecast, FetchError> {
        let place = self.resolve_place(&query.location).await?;
        let day = query.date.date_naive();

        info!(
            place = %place.name,
            latitude = place.latitude,
            longitude = place.longitude,
            %day,
            "Fetching hourly forecast from API"
        );

        let url = self.with_api_key(format!(
            "{}?latitude={}&longitude={}&hourly={}&start_date={}&end_date={}&timezone=GMT&timeformat=unixtime",
            self.forecast_url,
            place.latitude,
            place.longitude,
            HOURLY_FIELDS,
            day,
            day
        ));

        let response: ForecastResponse = self.http_client.get_json(&url).await?;

        map_hourly(response.hourly, day)
    }

    fn name(&self) -> &'static str {
        "open-meteo"
    }
}

fn pick_place(results: Vec<Place>, hints: &[String]) -> Option<Place> {
    let mut best: Option<(u32, Place)> = None;

    for place in results {
        let score = hints.iter().map(|hint| hint_score(&place, hint)).sum();
        // Ties keep the provider's ordering.
        if best.as_ref().is_none_or(|(top, _)| score > *top) {
            best = Some((score, place));
        }
    }

    best.map(|(_, place)| place)
}

fn hint_score(place: &Place, hint: &str) -> u32 {
    let eq = |field: &Option<String>| {
        field
            .as_deref()
            .is_some_and(|value| value.to_lowercase() == hint)
    };

    if eq(&place.admin1) || eq(&place.country) {
        3
    } else if eq(&place.country_code) {
        2
    } else if place
        .admin1
        .as_deref()
        .is_some_and(|admin1| admin1.to_lowercase().starts_with(hint))
    {
        1
    } else {
        0
    }
}

fn map_hourly(hourly: Hourly, day: NaiveDate) -> Result<DailyForecast, FetchError> {
    if hourly.time.len() != HOURS_PER_DAY {
        return Err(FetchError::invalid_response(format!(
            "expected {} hours, got {}",
            HOURS_PER_DAY,
            hourly.time.len()
        )));
    }

    let day_start = day.and_time(NaiveTime::MIN).and_utc().timestamp();
    let at = |values: &[Option<f64>], hour: usize| values.get(hour).copied().flatten();

    let mut records = Vec::with_capacity(HOURS_PER_DAY);
    for (hour, &time) in hourly.time.iter().enumerate() {
        if time != day_start + hour as i64 * 3600 {
            return Err(FetchError::invalid_response(format!(
                "hour {} has unexpected timestamp {}",
                hour, time
            )));
        }

        let temperature = at(&hourly.temperature_2m, hour).ok_or_else(|| {
            FetchError::invalid_response(format!("hour {} is missing temperature", hour))
        })?;
        let code = hourly.weather_code.get(hour).copied().flatten();

        records.push(HourlyRecord {
            time,
            temperature,
            uv_index: at(&hourly.uv_index, hour).unwrap_or(0.0),
            kind: code.map_or("unknown", weather_code_to_kind).to_string(),
            precip_probability: at(&hourly.precipitation_probability, hour).unwrap_or(0.0) / 100.0,
            precip_accumulation: at(&hourly.precipitation, hour).unwrap_or(0.0),
            visibility: at(&hourly.visibility, hour).unwrap_or(0.0),
        });
    }

    DailyForecast::new(records)
}

/// WMO weather interpretation code to a short kind.
fn weather_code_to_kind(code: u32) -> &'static str {
    match code {
        0 => "clear",
        1..=3 => "cloudy",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 | 66 | 67 => "sleet",
        61 | 63 | 65 | 80..=82 => "rain",
        71 | 73 | 75 | 77 | 85 | 86 => "snow",
        95 | 96 | 99 => "thunderstorm",
        _ => "unknown",
    }
}
