//! Query-string parameters accepted by list endpoints, and their conversion
//! into store filters. Empty parameters are ignored.

use airport_shared::{CrewFilter, FlightFilter, NameFilter, RouteFilter};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::validation::CatalogError;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn parse_date(field: &'static str, value: &Option<String>) -> Result<Option<NaiveDate>, CatalogError> {
    non_empty(value)
        .map(|v| {
            NaiveDate::parse_from_str(&v, DATE_FORMAT).map_err(|_| {
                CatalogError::invalid(field, "Date has wrong format. Use YYYY-MM-DD.")
            })
        })
        .transpose()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

impl NameQuery {
    pub fn filter(&self) -> NameFilter {
        NameFilter {
            name: non_empty(&self.name),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl CrewQuery {
    pub fn filter(&self) -> CrewFilter {
        CrewFilter {
            first_name: non_empty(&self.first_name),
            last_name: non_empty(&self.last_name),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteQuery {
    pub source: Option<String>,
    pub destination: Option<String>,
}

impl RouteQuery {
    pub fn filter(&self) -> RouteFilter {
        RouteFilter {
            source: non_empty(&self.source),
            destination: non_empty(&self.destination),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightQuery {
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
}

impl FlightQuery {
    pub fn filter(&self) -> Result<FlightFilter, CatalogError> {
        Ok(FlightFilter {
            departure_date: parse_date("departure_time", &self.departure_time)?,
            arrival_date: parse_date("arrival_time", &self.arrival_time)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_params_are_ignored() {
        let query: CrewQuery =
            serde_json::from_value(serde_json::json!({"first_name": "", "last_name": "doe"}))
                .unwrap();
        let filter = query.filter();
        assert_eq!(filter.first_name, None);
        assert_eq!(filter.last_name.as_deref(), Some("doe"));
    }

    #[test]
    fn test_flight_query_parses_dates() {
        let query = FlightQuery {
            departure_time: Some("2025-01-12".to_string()),
            arrival_time: None,
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.departure_date, NaiveDate::from_ymd_opt(2025, 1, 12));
        assert_eq!(filter.arrival_date, None);
    }

    #[test]
    fn test_flight_query_rejects_bad_date() {
        let query = FlightQuery {
            departure_time: None,
            arrival_time: Some("12/01/2025".to_string()),
        };
        assert_eq!(query.filter().unwrap_err().field(), "arrival_time");
    }
}
