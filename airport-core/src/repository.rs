use async_trait::async_trait;
use uuid::Uuid;
use airport_shared::{
    Airplane, AirplaneOverview, AirplaneType, AirplaneTypeOverview, Airport, Crew, CrewFilter,
    Flight, FlightFilter, FlightOverview, FlightSeating, NameFilter, NewAirplane, NewAirplaneType,
    NewAirport, NewCrew, NewFlight, NewOrder, NewRoute, Order, Route, RouteFilter, RouteOverview,
};

/// Persistence failures surfaced by every repository
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint fired. `index` is the position of the offending
    /// ticket when the violation happened while inserting an order's tickets.
    #[error("unique constraint violated")]
    UniqueViolation { index: Option<usize> },

    #[error("referenced record does not exist: {0}")]
    MissingReference(String),

    /// The flight of ticket `index` vanished between lookup and insert
    #[error("flight {flight_id} of ticket {index} does not exist")]
    UnknownFlight { index: usize, flight_id: i64 },

    /// A seat-grid change would leave sold tickets outside the grid
    #[error("{count} sold ticket(s) would fall outside the new seat grid")]
    TicketsOutsideGrid { count: i64 },

    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository trait for crew members
#[async_trait]
pub trait CrewRepository: Send + Sync {
    async fn list_crew(&self, filter: &CrewFilter) -> StoreResult<Vec<Crew>>;
    async fn get_crew(&self, id: i64) -> StoreResult<Option<Crew>>;
    async fn create_crew(&self, crew: &NewCrew) -> StoreResult<Crew>;
    async fn update_crew(&self, id: i64, crew: &NewCrew) -> StoreResult<Option<Crew>>;
    async fn delete_crew(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait AirportRepository: Send + Sync {
    async fn list_airports(&self, filter: &NameFilter) -> StoreResult<Vec<Airport>>;
    async fn get_airport(&self, id: i64) -> StoreResult<Option<Airport>>;
    async fn create_airport(&self, airport: &NewAirport) -> StoreResult<Airport>;
    async fn update_airport(&self, id: i64, airport: &NewAirport) -> StoreResult<Option<Airport>>;
    /// Cascades to routes starting or ending at the airport
    async fn delete_airport(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn list_routes(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteOverview>>;
    async fn get_route(&self, id: i64) -> StoreResult<Option<Route>>;
    async fn create_route(&self, route: &NewRoute) -> StoreResult<Route>;
    async fn update_route(&self, id: i64, route: &NewRoute) -> StoreResult<Option<Route>>;
    async fn delete_route(&self, id: i64) -> StoreResult<bool>;
}

/// Repository trait for airplanes and airplane types
#[async_trait]
pub trait AirplaneRepository: Send + Sync {
    async fn list_airplane_types(&self, filter: &NameFilter) -> StoreResult<Vec<AirplaneTypeOverview>>;
    async fn get_airplane_type(&self, id: i64) -> StoreResult<Option<AirplaneType>>;
    async fn create_airplane_type(&self, airplane_type: &NewAirplaneType) -> StoreResult<AirplaneType>;
    async fn update_airplane_type(
        &self,
        id: i64,
        airplane_type: &NewAirplaneType,
    ) -> StoreResult<Option<AirplaneType>>;
    async fn delete_airplane_type(&self, id: i64) -> StoreResult<bool>;
    async fn airplanes_of_type(&self, airplane_type_id: i64) -> StoreResult<Vec<Airplane>>;

    async fn list_airplanes(&self, filter: &NameFilter) -> StoreResult<Vec<AirplaneOverview>>;
    async fn get_airplane(&self, id: i64) -> StoreResult<Option<Airplane>>;
    async fn create_airplane(&self, airplane: &NewAirplane) -> StoreResult<Airplane>;
    /// Fails with [`StoreError::TicketsOutsideGrid`] when a sold ticket on
    /// one of the airplane's flights would no longer fit
    async fn update_airplane(&self, id: i64, airplane: &NewAirplane) -> StoreResult<Option<Airplane>>;
    async fn delete_airplane(&self, id: i64) -> StoreResult<bool>;
}

/// Repository trait for flight data access
#[async_trait]
pub trait FlightRepository: Send + Sync {
    /// Ordered by id; `tickets_available` reflects sold tickets
    async fn list_flights(&self, filter: &FlightFilter) -> StoreResult<Vec<FlightOverview>>;
    async fn flight_overviews(&self, ids: &[i64]) -> StoreResult<Vec<FlightOverview>>;
    async fn get_flight(&self, id: i64) -> StoreResult<Option<Flight>>;
    async fn create_flight(&self, flight: &NewFlight) -> StoreResult<Flight>;
    /// Same grid rule as [`AirplaneRepository::update_airplane`] when the
    /// flight moves to another airplane
    async fn update_flight(&self, id: i64, flight: &NewFlight) -> StoreResult<Option<Flight>>;
    /// Cascades to the flight's tickets. Orders left without tickets go too.
    async fn delete_flight(&self, id: i64) -> StoreResult<bool>;
    async fn crew_of_flight(&self, flight_id: i64) -> StoreResult<Vec<Crew>>;
}

/// Read/delete access to a user's orders. Orders are created through
/// [`OrderStore`] only.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Newest first
    async fn list_orders(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;
    async fn get_order(&self, user_id: Uuid, id: i64) -> StoreResult<Option<Order>>;
    /// Cascades to the order's tickets
    async fn delete_order(&self, user_id: Uuid, id: i64) -> StoreResult<bool>;
}

/// One isolated transaction over sold seats.
///
/// Nothing written through a ledger is visible to other ledgers until
/// [`TicketLedger::commit`] succeeds. Dropping a ledger without committing
/// discards its writes.
#[async_trait]
pub trait TicketLedger: Send {
    async fn find_flight(&mut self, flight_id: i64) -> StoreResult<Option<FlightSeating>>;

    async fn count_tickets_for(&mut self, flight_id: i64, row: i32, seat: i32) -> StoreResult<i64>;

    /// Inserts the order and one ticket per request. The `(row, seat, flight)`
    /// uniqueness constraint is checked here and reported as
    /// [`StoreError::UniqueViolation`] with the offending ticket index. A
    /// ticket whose flight no longer exists fails with
    /// [`StoreError::UnknownFlight`].
    async fn insert_order_with_tickets(&mut self, order: &NewOrder) -> StoreResult<Order>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn TicketLedger>>;
}

/// Everything the HTTP layer needs from a backing store
pub trait Store:
    CrewRepository
    + AirportRepository
    + RouteRepository
    + AirplaneRepository
    + FlightRepository
    + OrderRepository
    + OrderStore
{
}

impl<T> Store for T where
    T: CrewRepository
        + AirportRepository
        + RouteRepository
        + AirplaneRepository
        + FlightRepository
        + OrderRepository
        + OrderStore
{
}
