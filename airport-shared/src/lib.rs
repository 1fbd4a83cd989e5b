pub mod models;

pub use models::catalog::{
    Airplane, AirplaneOverview, AirplaneType, AirplaneTypeOverview, Airport, Crew, Flight,
    FlightOverview, NewAirplane, NewAirplaneType, NewAirport, NewCrew, NewFlight, NewRoute, Route,
    RouteOverview, SeatGrid,
};
pub use models::order::{FlightSeating, NewOrder, Order, Ticket, TicketRequest};
pub use models::filters::{contains_ci, CrewFilter, FlightFilter, NameFilter, RouteFilter};
