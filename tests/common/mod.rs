//! Common test utilities

#![allow(dead_code)]

use chrono::NaiveDate;
use serde_json::{json, Value};

use farecrawl::config::Config;
use farecrawl::models::{Route, TaskParameters};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// TPE-SIN round trip, 2025-07-21 to 2025-07-27
pub fn round_trip_params() -> TaskParameters {
    TaskParameters::round_trip(
        Route::new("TPE", "SIN"),
        date(2025, 7, 21),
        date(2025, 7, 27),
    )
}

/// Provider flight item as returned in `data`
pub fn provider_item(departure: &str, flight_no: &str, price: u32, token: &str) -> Value {
    json!({
        "departureDate": departure,
        "sectors": [
            {"airlineCode": "TR", "flightNo": flight_no, "cabinDesc": "Economy", "bookingClass": "V"}
        ],
        "seats": [
            {
                "routeSearchToken": format!("rst-{token}"),
                "outboundToken": format!("obt-{token}"),
                "adultPrice": price,
                "adultTax": 1280,
                "productDesc": ""
            }
        ]
    })
}

/// Successful provider response body
pub fn provider_body(items: Vec<Value>) -> Value {
    json!({"head": {"code": 0, "message": "ok"}, "data": items})
}

/// Config pointing at a mock provider, with fast retries and no pacing
pub fn config_for(endpoint: &str, output_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.api.endpoint_url = Some(endpoint.to_string());
    config.api.requests_per_second = 100.0;
    config.api.inbound_delay_ms = 0;
    config.api.transport_retries = 0;
    config.api.timeout_secs = 5;
    config.retry = farecrawl::utils::retry::RetryConfig::with_delays(2, 1, 5);
    config.storage.output_dir = output_dir.to_path_buf();
    config
}
