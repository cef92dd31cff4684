use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One hour of forecast data as served to clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HourlyRecord {
    /// Start of the hour, Unix epoch seconds
    pub time: i64,
    /// Air temperature in °C
    pub temperature: f64,
    pub uv_index: f64,
    /// Sky / precipitation kind, e.g. `clear`, `rain`, `snow`
    #[serde(rename = "type")]
    pub kind: String,
    /// Probability of precipitation as a 0-1 fraction
    pub precip_probability: f64,
    /// Precipitation in mm
    pub precip_accumulation: f64,
    /// Visibility in metres
    pub visibility: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct HourlyData {
    pub data: Vec<HourlyRecord>,
}

/// Body of a successful `/weather` response
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct WeatherResponse {
    pub hourly: HourlyData,
}

impl From<Vec<HourlyRecord>> for WeatherResponse {
    fn from(data: Vec<HourlyRecord>) -> Self {
        Self {
            hourly: HourlyData { data },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_record_serializes_exact_keys() {
        let record = HourlyRecord {
            time: 1_700_000_000,
            temperature: 12.5,
            uv_index: 3.0,
            kind: "rain".to_string(),
            precip_probability: 0.4,
            precip_accumulation: 1.2,
            visibility: 24_000.0,
        };

        let value = serde_json::to_value(&record).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();

        assert_eq!(
            keys,
            vec![
                "precipAccumulation",
                "precipProbability",
                "temperature",
                "time",
                "type",
                "uvIndex",
                "visibility",
            ]
        );
        assert_eq!(value["type"], "rain");
    }
}
