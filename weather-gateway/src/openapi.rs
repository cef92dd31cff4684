use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::cache::CacheStats;
use crate::handlers::{self, HealthResponse};
use common::errors::ErrorResponse;
use common::models::{HourlyData, HourlyRecord, WeatherResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::get_weather,
    ),
    components(schemas(
        WeatherResponse,
        HourlyData,
        HourlyRecord,
        ErrorResponse,
        HealthResponse,
        CacheStats,
    )),
    tags(
        (name = "weather", description = "Cached hourly forecasts"),
    ),
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
