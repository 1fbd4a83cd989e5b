pub mod repository;
pub mod seat;

pub use repository::{
    AirplaneRepository, AirportRepository, CrewRepository, FlightRepository, OrderRepository,
    OrderStore, RouteRepository, Store, StoreError, StoreResult, TicketLedger,
};
pub use seat::{validate_seat, SeatField, SeatRangeError};
