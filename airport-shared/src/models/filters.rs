use chrono::{DateTime, NaiveDate, Utc};

/// Case-insensitive substring match, the semantics of every name filter
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches_opt(value: &str, needle: &Option<String>) -> bool {
    needle.as_deref().map_or(true, |n| contains_ci(value, n))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    pub name: Option<String>,
}

impl NameFilter {
    pub fn matches(&self, name: &str) -> bool {
        matches_opt(name, &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrewFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl CrewFilter {
    pub fn matches(&self, first_name: &str, last_name: &str) -> bool {
        matches_opt(first_name, &self.first_name) && matches_opt(last_name, &self.last_name)
    }
}

/// Filters routes by source/destination airport name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFilter {
    pub source: Option<String>,
    pub destination: Option<String>,
}

impl RouteFilter {
    pub fn matches(&self, source: &str, destination: &str) -> bool {
        matches_opt(source, &self.source) && matches_opt(destination, &self.destination)
    }
}

/// Filters flights by the UTC calendar date of departure and/or arrival
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlightFilter {
    pub departure_date: Option<NaiveDate>,
    pub arrival_date: Option<NaiveDate>,
}

impl FlightFilter {
    pub fn matches(&self, departure: &DateTime<Utc>, arrival: &DateTime<Utc>) -> bool {
        self.departure_date.map_or(true, |d| departure.date_naive() == d)
            && self.arrival_date.map_or(true, |d| arrival.date_naive() == d)
    }
}
