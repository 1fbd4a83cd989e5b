use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A crew member that can be assigned to flights
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Crew {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl Crew {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCrew {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Airport {
    pub id: i64,
    pub name: String,
    pub closest_big_city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAirport {
    pub name: String,
    pub closest_big_city: String,
}

/// Directed connection between two airports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub id: i64,
    pub source_id: i64,
    pub destination_id: i64,
    pub distance: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRoute {
    pub source: i64,
    pub destination: i64,
    pub distance: i32,
}

/// Route row joined with its airport names, used by list views
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteOverview {
    pub id: i64,
    pub source: String,
    pub destination: String,
    pub distance: i32,
}

impl RouteOverview {
    pub fn label(&self) -> String {
        format!("{} > {}", self.source, self.destination)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AirplaneType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAirplaneType {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AirplaneTypeOverview {
    pub id: i64,
    pub name: String,
    pub airplanes: Vec<String>,
}

/// Physical seating layout of an airplane: `rows` x `seats_in_row`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SeatGrid {
    pub rows: i32,
    pub seats_in_row: i32,
}

impl SeatGrid {
    pub fn capacity(&self) -> i64 {
        i64::from(self.rows) * i64::from(self.seats_in_row)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Airplane {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub airplane_type_id: i64,
}

impl Airplane {
    pub fn grid(&self) -> SeatGrid {
        SeatGrid {
            rows: self.rows,
            seats_in_row: self.seats_in_row,
        }
    }

    pub fn capacity(&self) -> i64 {
        self.grid().capacity()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAirplane {
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub airplane_type: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AirplaneOverview {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
    pub airplane_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flight {
    pub id: i64,
    pub route_id: i64,
    pub airplane_id: i64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub crew_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewFlight {
    pub route: i64,
    pub airplane: i64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    #[serde(default)]
    pub crew: Vec<i64>,
}

/// Flight joined with route, airplane and seat availability
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlightOverview {
    pub id: i64,
    pub route: String,
    pub airplane_id: i64,
    pub airplane_name: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub capacity: i64,
    pub tickets_available: i64,
}
