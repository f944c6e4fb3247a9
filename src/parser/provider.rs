//! Parser for the provider's flight search JSON
//!
//! Each `data[]` item looks like:
//!
//! ```json
//! {
//!   "departureDate": "2025-07-21",
//!   "sectors": [{"airlineCode": "TR", "flightNo": "875", "cabinDesc": "Economy", "bookingClass": "V"}],
//!   "seats": [{"routeSearchToken": "...", "outboundToken": "...", "adultPrice": 5230, "adultTax": 1280, "productDesc": "..."}]
//! }
//! ```

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::{parse_provider_date, FlightParser};
use crate::crawler::client::ApiResponse;
use crate::models::{FlightInfo, FlightSegment};
use crate::utils::error::ParseError;

/// `productDesc` marking an offer sold by an overseas supplier
pub const OVERSEAS_SUPPLIER_DESC: &str = "由海外供應商提供";

/// Parser for the provider's JSON item layout
#[derive(Debug, Clone)]
pub struct ProviderJsonParser {
    reference_date: Option<NaiveDate>,
}

impl Default for ProviderJsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderJsonParser {
    /// Parser resolving year-less dates against the current date
    pub fn new() -> Self {
        Self {
            reference_date: None,
        }
    }

    /// Parser resolving year-less dates against a fixed date
    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self {
            reference_date: Some(reference_date),
        }
    }

    fn reference(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Parse one item into a flight with outbound segments only
    pub fn parse_item(&self, item: &Value) -> Result<FlightInfo, ParseError> {
        let segments = parse_segments(item.get("sectors"));
        if segments.is_empty() {
            return Err(ParseError::NoSegments);
        }

        let departure_date = item
            .get("departureDate")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::InvalidDate(String::from("<missing>")))
            .and_then(|raw| parse_provider_date(raw, self.reference()))?;

        let seat = item
            .get("seats")
            .and_then(Value::as_array)
            .and_then(|seats| seats.first());

        let (price, tax) = match seat {
            Some(seat) => fare(seat),
            None => {
                warn!("Item has no seats, using zero fare");
                (0.0, 0.0)
            }
        };

        Ok(FlightInfo {
            departure_date: Some(departure_date),
            return_date: None,
            price,
            tax,
            outbound_segments: segments,
            inbound_segments: Vec::new(),
            route_search_token: seat.and_then(|s| string_field(s, "routeSearchToken")),
            outbound_token: seat.and_then(|s| string_field(s, "outboundToken")),
            product_desc: seat
                .and_then(|s| s.get("productDesc"))
                .and_then(Value::as_str)
                .is_some_and(|desc| desc == OVERSEAS_SUPPLIER_DESC),
        })
    }
}

impl FlightParser for ProviderJsonParser {
    fn parse_outbound(&self, response: &ApiResponse) -> Result<Vec<FlightInfo>, ParseError> {
        let items = data_items(response)?;

        let flights: Vec<FlightInfo> = items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| match self.parse_item(item) {
                Ok(flight) => Some(flight),
                Err(e) => {
                    warn!(index = idx, error = %e, "Skipping outbound item");
                    None
                }
            })
            .collect();

        debug!(parsed = flights.len(), total = items.len(), "Parsed outbound items");
        Ok(flights)
    }

    fn parse_inbound(
        &self,
        response: &ApiResponse,
        outbound: &FlightInfo,
    ) -> Result<Vec<FlightInfo>, ParseError> {
        let items = data_items(response)?;

        let flights: Vec<FlightInfo> = items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| match self.parse_item(item) {
                Ok(inbound) => Some(FlightInfo {
                    departure_date: outbound.departure_date,
                    return_date: inbound.departure_date,
                    price: inbound.price,
                    tax: inbound.tax,
                    outbound_segments: outbound.outbound_segments.clone(),
                    inbound_segments: inbound.outbound_segments,
                    route_search_token: outbound.route_search_token.clone(),
                    outbound_token: outbound.outbound_token.clone(),
                    product_desc: outbound.product_desc,
                }),
                Err(e) => {
                    warn!(index = idx, error = %e, "Skipping inbound item");
                    None
                }
            })
            .collect();

        debug!(
            combinations = flights.len(),
            route_search_token = outbound.route_search_token.as_deref().unwrap_or(""),
            "Parsed inbound items"
        );
        Ok(flights)
    }
}

/// Items of `data`; null means no results
fn data_items(response: &ApiResponse) -> Result<&[Value], ParseError> {
    match &response.data {
        Value::Null => Ok(Default::default()),
        Value::Array(items) => Ok(items.as_slice()),
        other => Err(ParseError::UnexpectedShape(format!(
            "'data' should be an array, got {}",
            json_type(other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_segments(sectors: Option<&Value>) -> Vec<FlightSegment> {
    let Some(sectors) = sectors.and_then(Value::as_array) else {
        return Vec::new();
    };

    sectors
        .iter()
        .enumerate()
        .filter_map(|(idx, sector)| {
            let segment = parse_segment(sector);
            if segment.is_none() {
                warn!(index = idx, "Sector has no flight number");
            }
            segment
        })
        .collect()
}

fn parse_segment(sector: &Value) -> Option<FlightSegment> {
    let text = |key: &str| {
        sector
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
    };

    let airline = text("airlineCode");
    let number = text("flightNo");
    if number.is_empty() {
        return None;
    }

    let flight_number = if airline.is_empty()
        || number.to_uppercase().starts_with(&airline.to_uppercase())
    {
        number.to_string()
    } else {
        format!("{airline}{number}")
    };

    let cabin_class = format!("{}{}", text("cabinDesc"), text("bookingClass"))
        .trim()
        .to_string();

    Some(FlightSegment::new(flight_number.to_uppercase(), cabin_class))
}

/// `(price, tax)` from a seat; price falls back to `priceWithoutTax`
fn fare(seat: &Value) -> (f64, f64) {
    let price = number_field(seat, "adultPrice")
        .or_else(|_| number_field(seat, "priceWithoutTax"))
        .unwrap_or_else(|e| {
            warn!(error = %e, "Invalid price, using zero");
            0.0
        });

    let tax = match seat.get("adultTax") {
        None | Some(Value::Null) => 0.0,
        Some(_) => number_field(seat, "adultTax").unwrap_or_else(|e| {
            warn!(error = %e, "Invalid tax, using zero");
            0.0
        }),
    };

    (price.max(0.0), tax.max(0.0))
}

fn number_field(value: &Value, field: &str) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        field: field.to_string(),
    };

    match value.get(field) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().replace(',', "").parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parser() -> ProviderJsonParser {
        ProviderJsonParser::with_reference_date(date(2025, 6, 1))
    }

    fn item(flight_no: &str, departure: &str, price: Value) -> Value {
        json!({
            "departureDate": departure,
            "sectors": [
                {"airlineCode": "TR", "flightNo": flight_no, "cabinDesc": "Economy", "bookingClass": "V"}
            ],
            "seats": [
                {"routeSearchToken": "rst-1", "outboundToken": "obt-1", "adultPrice": price, "adultTax": 1280, "productDesc": ""}
            ]
        })
    }

    #[test]
    fn test_parse_outbound() {
        let response = ApiResponse::new(json!([
            item("875", "2025-07-21", json!(5230)),
            item("tr877", "7月21日", json!("4,990")),
        ]));

        let flights = parser().parse_outbound(&response).unwrap();
        assert_eq!(flights.len(), 2);

        assert_eq!(flights[0].outbound_segments[0].flight_number, "TR875");
        assert_eq!(flights[0].outbound_segments[0].cabin_class, "EconomyV");
        assert_eq!(flights[0].price, 5230.0);
        assert_eq!(flights[0].tax, 1280.0);
        assert_eq!(flights[0].route_search_token.as_deref(), Some("rst-1"));
        assert!(flights[0].inbound_segments.is_empty());

        assert_eq!(flights[1].outbound_segments[0].flight_number, "TR877");
        assert_eq!(flights[1].departure_date, Some(date(2025, 7, 21)));
        assert_eq!(flights[1].price, 4990.0);
    }

    #[test]
    fn test_null_data_is_empty() {
        let flights = parser().parse_outbound(&ApiResponse::new(Value::Null)).unwrap();
        assert!(flights.is_empty());
    }

    #[test]
    fn test_non_array_data_is_error() {
        let result = parser().parse_outbound(&ApiResponse::new(json!({"flights": []})));
        assert!(matches!(result, Err(ParseError::UnexpectedShape(_))));
    }

    #[test]
    fn test_malformed_items_skipped() {
        let response = ApiResponse::new(json!([
            {"departureDate": "2025-07-21", "sectors": []},
            {"sectors": [{"airlineCode": "TR", "flightNo": "875"}]},
            item("875", "2025-07-21", json!(5230)),
        ]));

        let flights = parser().parse_outbound(&response).unwrap();
        assert_eq!(flights.len(), 1);
    }

    #[test]
    fn test_price_fallback_and_overseas_flag() {
        let response = ApiResponse::new(json!([{
            "departureDate": "20250721",
            "sectors": [{"airlineCode": "", "flightNo": "ci751", "cabinDesc": "Economy"}],
            "seats": [{"priceWithoutTax": 3100, "productDesc": OVERSEAS_SUPPLIER_DESC}]
        }]));

        let flights = parser().parse_outbound(&response).unwrap();
        assert_eq!(flights[0].price, 3100.0);
        assert_eq!(flights[0].tax, 0.0);
        assert!(flights[0].product_desc);
        assert_eq!(flights[0].outbound_segments[0].flight_number, "CI751");
        assert!(flights[0].inbound_tokens().is_none());
    }

    #[test]
    fn test_parse_inbound_combines_with_outbound() {
        let outbound = parser()
            .parse_outbound(&ApiResponse::new(json!([item("875", "2025-07-21", json!(5230))])))
            .unwrap()
            .remove(0);

        let response = ApiResponse::new(json!([
            item("874", "2025-07-27", json!(6100)),
            item("876", "2025-07-28", json!(5900)),
        ]));

        let combined = parser().parse_inbound(&response, &outbound).unwrap();
        assert_eq!(combined.len(), 2);

        let first = &combined[0];
        assert_eq!(first.departure_date, Some(date(2025, 7, 21)));
        assert_eq!(first.return_date, Some(date(2025, 7, 27)));
        assert_eq!(first.price, 6100.0);
        assert_eq!(first.outbound_segments, outbound.outbound_segments);
        assert_eq!(first.inbound_segments[0].flight_number, "TR874");
        assert_eq!(first.outbound_token, outbound.outbound_token);
    }
}
