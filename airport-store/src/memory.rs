use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use airport_core::{
    AirplaneRepository, AirportRepository, CrewRepository, FlightRepository, OrderRepository,
    OrderStore, RouteRepository, StoreError, StoreResult, TicketLedger,
};
use airport_shared::{
    Airplane, AirplaneOverview, AirplaneType, AirplaneTypeOverview, Airport, Crew, CrewFilter,
    Flight, FlightFilter, FlightOverview, FlightSeating, NameFilter, NewAirplane, NewAirplaneType,
    NewAirport, NewCrew, NewFlight, NewOrder, NewRoute, Order, Route, RouteFilter, RouteOverview,
    SeatGrid, Ticket,
};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// `(flight_id, row, seat)`, the key every sold seat is unique on
type SeatKey = (i64, i32, i32);

#[derive(Debug, Clone)]
struct OrderRecord {
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Sequences {
    crew: i64,
    airport: i64,
    route: i64,
    airplane_type: i64,
    airplane: i64,
    flight: i64,
    order: i64,
    ticket: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct Tables {
    seq: Sequences,
    crew: BTreeMap<i64, Crew>,
    airports: BTreeMap<i64, Airport>,
    routes: BTreeMap<i64, Route>,
    airplane_types: BTreeMap<i64, AirplaneType>,
    airplanes: BTreeMap<i64, Airplane>,
    flights: BTreeMap<i64, Flight>,
    orders: BTreeMap<i64, OrderRecord>,
    tickets: BTreeMap<i64, Ticket>,
    sold: HashSet<SeatKey>,
}

impl Tables {
    fn missing(what: &str, id: i64) -> StoreError {
        StoreError::MissingReference(format!("{what} {id} does not exist"))
    }

    fn check_route_refs(&self, route: &NewRoute) -> StoreResult<()> {
        for id in [route.source, route.destination] {
            if !self.airports.contains_key(&id) {
                return Err(Self::missing("airport", id));
            }
        }
        Ok(())
    }

    fn check_flight_refs(&self, flight: &NewFlight) -> StoreResult<()> {
        if !self.routes.contains_key(&flight.route) {
            return Err(Self::missing("route", flight.route));
        }
        if !self.airplanes.contains_key(&flight.airplane) {
            return Err(Self::missing("airplane", flight.airplane));
        }
        if let Some(id) = flight.crew.iter().find(|id| !self.crew.contains_key(id)) {
            return Err(Self::missing("crew", *id));
        }
        Ok(())
    }

    fn remove_tickets_where(&mut self, pred: impl Fn(&Ticket) -> bool) {
        let doomed: Vec<i64> = self
            .tickets
            .values()
            .filter(|t| pred(t))
            .map(|t| t.id)
            .collect();
        for id in doomed {
            if let Some(t) = self.tickets.remove(&id) {
                self.sold.remove(&(t.flight_id, t.row, t.seat));
            }
        }
    }

    fn remove_flights_where(&mut self, pred: impl Fn(&Flight) -> bool) {
        let doomed: HashSet<i64> = self
            .flights
            .values()
            .filter(|f| pred(f))
            .map(|f| f.id)
            .collect();
        if doomed.is_empty() {
            return;
        }
        self.flights.retain(|id, _| !doomed.contains(id));
        self.remove_tickets_where(|t| doomed.contains(&t.flight_id));
        self.remove_empty_orders();
    }

    fn remove_empty_orders(&mut self) {
        let ticketed: HashSet<i64> = self.tickets.values().map(|t| t.order_id).collect();
        self.orders.retain(|id, _| ticketed.contains(id));
    }

    /// Sold tickets on flights matching `on` that do not fit `grid`
    fn outside_grid(&self, on: impl Fn(i64) -> bool, grid: SeatGrid) -> i64 {
        self.tickets
            .values()
            .filter(|t| on(t.flight_id))
            .filter(|t| t.row > grid.rows || t.seat > grid.seats_in_row)
            .count() as i64
    }

    fn sold_on(&self, flight_id: i64) -> i64 {
        self.tickets.values().filter(|t| t.flight_id == flight_id).count() as i64
    }

    fn overview(&self, flight: &Flight) -> Option<FlightOverview> {
        let route = self.routes.get(&flight.route_id)?;
        let source = self.airports.get(&route.source_id)?;
        let destination = self.airports.get(&route.destination_id)?;
        let airplane = self.airplanes.get(&flight.airplane_id)?;
        let capacity = airplane.capacity();
        Some(FlightOverview {
            id: flight.id,
            route: format!("{} > {}", source.name, destination.name),
            airplane_id: airplane.id,
            airplane_name: airplane.name.clone(),
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            capacity,
            tickets_available: capacity - self.sold_on(flight.id),
        })
    }

    fn order(&self, id: i64, record: &OrderRecord) -> Order {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .values()
            .filter(|t| t.order_id == id)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (t.row, t.seat, t.id));
        Order {
            id,
            user_id: record.user_id,
            created_at: record.created_at,
            tickets,
        }
    }
}

/// In-process implementation of every repository trait.
///
/// Order transactions hold the table lock for their whole lifetime, so they
/// run one at a time. Writes made through a ledger are staged and only
/// applied to the tables on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    pub async fn ticket_count(&self) -> usize {
        self.tables.lock().await.tickets.len()
    }
}

#[async_trait]
impl CrewRepository for MemoryStore {
    async fn list_crew(&self, filter: &CrewFilter) -> StoreResult<Vec<Crew>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .crew
            .values()
            .filter(|c| filter.matches(&c.first_name, &c.last_name))
            .cloned()
            .collect())
    }

    async fn get_crew(&self, id: i64) -> StoreResult<Option<Crew>> {
        Ok(self.tables.lock().await.crew.get(&id).cloned())
    }

    async fn create_crew(&self, crew: &NewCrew) -> StoreResult<Crew> {
        let mut tables = self.tables.lock().await;
        let id = next(&mut tables.seq.crew);
        let created = Crew {
            id,
            first_name: crew.first_name.clone(),
            last_name: crew.last_name.clone(),
        };
        tables.crew.insert(id, created.clone());
        Ok(created)
    }

    async fn update_crew(&self, id: i64, crew: &NewCrew) -> StoreResult<Option<Crew>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.crew.get_mut(&id).map(|existing| {
            existing.first_name = crew.first_name.clone();
            existing.last_name = crew.last_name.clone();
            existing.clone()
        }))
    }

    async fn delete_crew(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.crew.remove(&id).is_none() {
            return Ok(false);
        }
        for flight in tables.flights.values_mut() {
            flight.crew_ids.retain(|c| *c != id);
        }
        Ok(true)
    }
}

#[async_trait]
impl AirportRepository for MemoryStore {
    async fn list_airports(&self, filter: &NameFilter) -> StoreResult<Vec<Airport>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .airports
            .values()
            .filter(|a| filter.matches(&a.name))
            .cloned()
            .collect())
    }

    async fn get_airport(&self, id: i64) -> StoreResult<Option<Airport>> {
        Ok(self.tables.lock().await.airports.get(&id).cloned())
    }

    async fn create_airport(&self, airport: &NewAirport) -> StoreResult<Airport> {
        let mut tables = self.tables.lock().await;
        let id = next(&mut tables.seq.airport);
        let created = Airport {
            id,
            name: airport.name.clone(),
            closest_big_city: airport.closest_big_city.clone(),
        };
        tables.airports.insert(id, created.clone());
        Ok(created)
    }

    async fn update_airport(&self, id: i64, airport: &NewAirport) -> StoreResult<Option<Airport>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.airports.get_mut(&id).map(|existing| {
            existing.name = airport.name.clone();
            existing.closest_big_city = airport.closest_big_city.clone();
            existing.clone()
        }))
    }

    async fn delete_airport(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.airports.remove(&id).is_none() {
            return Ok(false);
        }
        let routes: HashSet<i64> = tables
            .routes
            .values()
            .filter(|r| r.source_id == id || r.destination_id == id)
            .map(|r| r.id)
            .collect();
        tables.routes.retain(|rid, _| !routes.contains(rid));
        tables.remove_flights_where(|f| routes.contains(&f.route_id));
        Ok(true)
    }
}

#[async_trait]
impl RouteRepository for MemoryStore {
    async fn list_routes(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteOverview>> {
        let tables = self.tables.lock().await;
        let mut routes = Vec::new();
        for route in tables.routes.values() {
            let (Some(source), Some(destination)) = (
                tables.airports.get(&route.source_id),
                tables.airports.get(&route.destination_id),
            ) else {
                continue;
            };
            if filter.matches(&source.name, &destination.name) {
                routes.push(RouteOverview {
                    id: route.id,
                    source: source.name.clone(),
                    destination: destination.name.clone(),
                    distance: route.distance,
                });
            }
        }
        Ok(routes)
    }

    async fn get_route(&self, id: i64) -> StoreResult<Option<Route>> {
        Ok(self.tables.lock().await.routes.get(&id).cloned())
    }

    async fn create_route(&self, route: &NewRoute) -> StoreResult<Route> {
        let mut tables = self.tables.lock().await;
        tables.check_route_refs(route)?;
        let id = next(&mut tables.seq.route);
        let created = Route {
            id,
            source_id: route.source,
            destination_id: route.destination,
            distance: route.distance,
        };
        tables.routes.insert(id, created.clone());
        Ok(created)
    }

    async fn update_route(&self, id: i64, route: &NewRoute) -> StoreResult<Option<Route>> {
        let mut tables = self.tables.lock().await;
        if !tables.routes.contains_key(&id) {
            return Ok(None);
        }
        tables.check_route_refs(route)?;
        Ok(tables.routes.get_mut(&id).map(|existing| {
            existing.source_id = route.source;
            existing.destination_id = route.destination;
            existing.distance = route.distance;
            existing.clone()
        }))
    }

    async fn delete_route(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.routes.remove(&id).is_none() {
            return Ok(false);
        }
        tables.remove_flights_where(|f| f.route_id == id);
        Ok(true)
    }
}

#[async_trait]
impl AirplaneRepository for MemoryStore {
    async fn list_airplane_types(&self, filter: &NameFilter) -> StoreResult<Vec<AirplaneTypeOverview>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .airplane_types
            .values()
            .filter(|t| filter.matches(&t.name))
            .map(|t| AirplaneTypeOverview {
                id: t.id,
                name: t.name.clone(),
                airplanes: tables
                    .airplanes
                    .values()
                    .filter(|a| a.airplane_type_id == t.id)
                    .map(|a| a.name.clone())
                    .collect(),
            })
            .collect())
    }

    async fn get_airplane_type(&self, id: i64) -> StoreResult<Option<AirplaneType>> {
        Ok(self.tables.lock().await.airplane_types.get(&id).cloned())
    }

    async fn create_airplane_type(&self, airplane_type: &NewAirplaneType) -> StoreResult<AirplaneType> {
        let mut tables = self.tables.lock().await;
        let id = next(&mut tables.seq.airplane_type);
        let created = AirplaneType { id, name: airplane_type.name.clone() };
        tables.airplane_types.insert(id, created.clone());
        Ok(created)
    }

    async fn update_airplane_type(
        &self,
        id: i64,
        airplane_type: &NewAirplaneType,
    ) -> StoreResult<Option<AirplaneType>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.airplane_types.get_mut(&id).map(|existing| {
            existing.name = airplane_type.name.clone();
            existing.clone()
        }))
    }

    async fn delete_airplane_type(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.airplane_types.remove(&id).is_none() {
            return Ok(false);
        }
        let airplanes: HashSet<i64> = tables
            .airplanes
            .values()
            .filter(|a| a.airplane_type_id == id)
            .map(|a| a.id)
            .collect();
        tables.airplanes.retain(|aid, _| !airplanes.contains(aid));
        tables.remove_flights_where(|f| airplanes.contains(&f.airplane_id));
        Ok(true)
    }

    async fn airplanes_of_type(&self, airplane_type_id: i64) -> StoreResult<Vec<Airplane>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .airplanes
            .values()
            .filter(|a| a.airplane_type_id == airplane_type_id)
            .cloned()
            .collect())
    }

    async fn list_airplanes(&self, filter: &NameFilter) -> StoreResult<Vec<AirplaneOverview>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .airplanes
            .values()
            .filter(|a| filter.matches(&a.name))
            .filter_map(|a| {
                let airplane_type = tables.airplane_types.get(&a.airplane_type_id)?;
                Some(AirplaneOverview {
                    id: a.id,
                    name: a.name.clone(),
                    rows: a.rows,
                    seats_in_row: a.seats_in_row,
                    capacity: a.capacity(),
                    airplane_type: airplane_type.name.clone(),
                })
            })
            .collect())
    }

    async fn get_airplane(&self, id: i64) -> StoreResult<Option<Airplane>> {
        Ok(self.tables.lock().await.airplanes.get(&id).cloned())
    }

    async fn create_airplane(&self, airplane: &NewAirplane) -> StoreResult<Airplane> {
        let mut tables = self.tables.lock().await;
        if !tables.airplane_types.contains_key(&airplane.airplane_type) {
            return Err(Tables::missing("airplane type", airplane.airplane_type));
        }
        let id = next(&mut tables.seq.airplane);
        let created = Airplane {
            id,
            name: airplane.name.clone(),
            rows: airplane.rows,
            seats_in_row: airplane.seats_in_row,
            airplane_type_id: airplane.airplane_type,
        };
        tables.airplanes.insert(id, created.clone());
        Ok(created)
    }

    async fn update_airplane(&self, id: i64, airplane: &NewAirplane) -> StoreResult<Option<Airplane>> {
        let mut tables = self.tables.lock().await;
        if !tables.airplanes.contains_key(&id) {
            return Ok(None);
        }
        if !tables.airplane_types.contains_key(&airplane.airplane_type) {
            return Err(Tables::missing("airplane type", airplane.airplane_type));
        }
        let grid = SeatGrid { rows: airplane.rows, seats_in_row: airplane.seats_in_row };
        let flights: HashSet<i64> = tables
            .flights
            .values()
            .filter(|f| f.airplane_id == id)
            .map(|f| f.id)
            .collect();
        let count = tables.outside_grid(|flight| flights.contains(&flight), grid);
        if count > 0 {
            return Err(StoreError::TicketsOutsideGrid { count });
        }
        Ok(tables.airplanes.get_mut(&id).map(|existing| {
            existing.name = airplane.name.clone();
            existing.rows = airplane.rows;
            existing.seats_in_row = airplane.seats_in_row;
            existing.airplane_type_id = airplane.airplane_type;
            existing.clone()
        }))
    }

    async fn delete_airplane(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.airplanes.remove(&id).is_none() {
            return Ok(false);
        }
        tables.remove_flights_where(|f| f.airplane_id == id);
        Ok(true)
    }
}

fn crew_set(crew: &[i64]) -> Vec<i64> {
    let mut ids = crew.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[async_trait]
impl FlightRepository for MemoryStore {
    async fn list_flights(&self, filter: &FlightFilter) -> StoreResult<Vec<FlightOverview>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .flights
            .values()
            .filter(|f| filter.matches(&f.departure_time, &f.arrival_time))
            .filter_map(|f| tables.overview(f))
            .collect())
    }

    async fn flight_overviews(&self, ids: &[i64]) -> StoreResult<Vec<FlightOverview>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .flights
            .values()
            .filter(|f| ids.contains(&f.id))
            .filter_map(|f| tables.overview(f))
            .collect())
    }

    async fn get_flight(&self, id: i64) -> StoreResult<Option<Flight>> {
        Ok(self.tables.lock().await.flights.get(&id).cloned())
    }

    async fn create_flight(&self, flight: &NewFlight) -> StoreResult<Flight> {
        let mut tables = self.tables.lock().await;
        tables.check_flight_refs(flight)?;
        let id = next(&mut tables.seq.flight);
        let created = Flight {
            id,
            route_id: flight.route,
            airplane_id: flight.airplane,
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            crew_ids: crew_set(&flight.crew),
        };
        tables.flights.insert(id, created.clone());
        Ok(created)
    }

    async fn update_flight(&self, id: i64, flight: &NewFlight) -> StoreResult<Option<Flight>> {
        let mut tables = self.tables.lock().await;
        if !tables.flights.contains_key(&id) {
            return Ok(None);
        }
        tables.check_flight_refs(flight)?;
        if let Some(airplane) = tables.airplanes.get(&flight.airplane) {
            let count = tables.outside_grid(|f| f == id, airplane.grid());
            if count > 0 {
                return Err(StoreError::TicketsOutsideGrid { count });
            }
        }
        Ok(tables.flights.get_mut(&id).map(|existing| {
            existing.route_id = flight.route;
            existing.airplane_id = flight.airplane;
            existing.departure_time = flight.departure_time;
            existing.arrival_time = flight.arrival_time;
            existing.crew_ids = crew_set(&flight.crew);
            existing.clone()
        }))
    }

    async fn delete_flight(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.flights.contains_key(&id) {
            return Ok(false);
        }
        tables.remove_flights_where(|f| f.id == id);
        Ok(true)
    }

    async fn crew_of_flight(&self, flight_id: i64) -> StoreResult<Vec<Crew>> {
        let tables = self.tables.lock().await;
        let Some(flight) = tables.flights.get(&flight_id) else {
            return Ok(Vec::new());
        };
        Ok(flight
            .crew_ids
            .iter()
            .filter_map(|id| tables.crew.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn list_orders(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|(_, record)| record.user_id == user_id)
            .map(|(id, record)| tables.order(*id, record))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn get_order(&self, user_id: Uuid, id: i64) -> StoreResult<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .get(&id)
            .filter(|record| record.user_id == user_id)
            .map(|record| tables.order(id, record)))
    }

    async fn delete_order(&self, user_id: Uuid, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let owned = tables
            .orders
            .get(&id)
            .is_some_and(|record| record.user_id == user_id);
        if !owned {
            return Ok(false);
        }
        tables.orders.remove(&id);
        tables.remove_tickets_where(|t| t.order_id == id);
        Ok(true)
    }
}

struct StagedOrder {
    id: i64,
    record: OrderRecord,
    tickets: Vec<Ticket>,
}

/// Exclusive transaction over the in-memory tables
pub struct MemoryLedger {
    tables: OwnedMutexGuard<Tables>,
    staged: Vec<StagedOrder>,
}

impl MemoryLedger {
    fn staged_seats(&self) -> impl Iterator<Item = SeatKey> + '_ {
        self.staged
            .iter()
            .flat_map(|o| o.tickets.iter().map(|t| (t.flight_id, t.row, t.seat)))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn TicketLedger>> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(Box::new(MemoryLedger { tables, staged: Vec::new() }))
    }
}

#[async_trait]
impl TicketLedger for MemoryLedger {
    async fn find_flight(&mut self, flight_id: i64) -> StoreResult<Option<FlightSeating>> {
        Ok(self.tables.flights.get(&flight_id).and_then(|flight| {
            let airplane = self.tables.airplanes.get(&flight.airplane_id)?;
            Some(FlightSeating { flight_id, grid: airplane.grid() })
        }))
    }

    async fn count_tickets_for(&mut self, flight_id: i64, row: i32, seat: i32) -> StoreResult<i64> {
        let key = (flight_id, row, seat);
        let persisted = i64::from(self.tables.sold.contains(&key));
        let staged = self.staged_seats().filter(|k| *k == key).count() as i64;
        Ok(persisted + staged)
    }

    async fn insert_order_with_tickets(&mut self, order: &NewOrder) -> StoreResult<Order> {
        let mut seen: HashSet<SeatKey> = self.staged_seats().collect();
        for (index, request) in order.tickets.iter().enumerate() {
            let key = (request.flight, request.row, request.seat);
            if self.tables.sold.contains(&key) || !seen.insert(key) {
                return Err(StoreError::UniqueViolation { index: Some(index) });
            }
            if !self.tables.flights.contains_key(&request.flight) {
                return Err(StoreError::UnknownFlight { index, flight_id: request.flight });
            }
        }

        let order_id = next(&mut self.tables.seq.order);
        let mut tickets: Vec<Ticket> = order
            .tickets
            .iter()
            .map(|request| Ticket {
                id: next(&mut self.tables.seq.ticket),
                row: request.row,
                seat: request.seat,
                flight_id: request.flight,
                order_id,
            })
            .collect();
        tickets.sort_by_key(|t| (t.row, t.seat, t.id));

        let record = OrderRecord { user_id: order.user_id, created_at: order.created_at };
        let created = Order {
            id: order_id,
            user_id: record.user_id,
            created_at: record.created_at,
            tickets: tickets.clone(),
        };
        self.staged.push(StagedOrder { id: order_id, record, tickets });
        Ok(created)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryLedger { mut tables, staged } = *self;
        for order in staged {
            tables.orders.insert(order.id, order.record);
            for ticket in order.tickets {
                tables.sold.insert((ticket.flight_id, ticket.row, ticket.seat));
                tables.tickets.insert(ticket.id, ticket);
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airport_shared::TicketRequest;
    use chrono::TimeZone;

    struct Fixture {
        store: MemoryStore,
        route: i64,
        airplane: i64,
        flight: i64,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let kbp = store
            .create_airport(&NewAirport { name: "Boryspil".into(), closest_big_city: "Kyiv".into() })
            .await
            .unwrap();
        let waw = store
            .create_airport(&NewAirport { name: "Chopin".into(), closest_big_city: "Warsaw".into() })
            .await
            .unwrap();
        let route = store
            .create_route(&NewRoute { source: kbp.id, destination: waw.id, distance: 690 })
            .await
            .unwrap();
        let airplane_type = store
            .create_airplane_type(&NewAirplaneType { name: "Airbus A320".into() })
            .await
            .unwrap();
        let airplane = store
            .create_airplane(&NewAirplane {
                name: "UR-PSA".into(),
                rows: 25,
                seats_in_row: 6,
                airplane_type: airplane_type.id,
            })
            .await
            .unwrap();
        let flight = store
            .create_flight(&NewFlight {
                route: route.id,
                airplane: airplane.id,
                departure_time: Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap(),
                arrival_time: Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap(),
                crew: vec![],
            })
            .await
            .unwrap();
        Fixture { store, route: route.id, airplane: airplane.id, flight: flight.id }
    }

    fn new_order(user_id: Uuid, tickets: Vec<TicketRequest>) -> NewOrder {
        NewOrder { user_id, created_at: Utc::now(), tickets }
    }

    #[tokio::test]
    async fn test_commit_makes_order_visible() {
        let fx = fixture().await;
        let user = Uuid::new_v4();
        let mut ledger = fx.store.begin().await.unwrap();
        let order = ledger
            .insert_order_with_tickets(&new_order(
                user,
                vec![
                    TicketRequest { row: 3, seat: 1, flight: fx.flight },
                    TicketRequest { row: 2, seat: 3, flight: fx.flight },
                ],
            ))
            .await
            .unwrap();
        assert_eq!(ledger.count_tickets_for(fx.flight, 2, 3).await.unwrap(), 1);
        ledger.commit().await.unwrap();

        let stored = fx.store.get_order(user, order.id).await.unwrap().unwrap();
        let seats: Vec<(i32, i32)> = stored.tickets.iter().map(|t| (t.row, t.seat)).collect();
        assert_eq!(seats, vec![(2, 3), (3, 1)]);
        assert_eq!(fx.store.ticket_count().await, 2);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_writes() {
        let fx = fixture().await;
        let user = Uuid::new_v4();
        let ticket = TicketRequest { row: 1, seat: 1, flight: fx.flight };

        let mut ledger = fx.store.begin().await.unwrap();
        ledger.insert_order_with_tickets(&new_order(user, vec![ticket])).await.unwrap();
        ledger.rollback().await.unwrap();
        assert_eq!(fx.store.order_count().await, 0);

        {
            let mut ledger = fx.store.begin().await.unwrap();
            ledger.insert_order_with_tickets(&new_order(user, vec![ticket])).await.unwrap();
        }
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.store.ticket_count().await, 0);
    }

    #[tokio::test]
    async fn test_unique_violation_reports_ticket_index() {
        let fx = fixture().await;
        let user = Uuid::new_v4();
        let taken = TicketRequest { row: 2, seat: 3, flight: fx.flight };

        let mut ledger = fx.store.begin().await.unwrap();
        ledger.insert_order_with_tickets(&new_order(user, vec![taken])).await.unwrap();
        ledger.commit().await.unwrap();

        let mut ledger = fx.store.begin().await.unwrap();
        let err = ledger
            .insert_order_with_tickets(&new_order(
                user,
                vec![TicketRequest { row: 1, seat: 1, flight: fx.flight }, taken],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { index: Some(1) }));
    }

    #[tokio::test]
    async fn test_missing_references_are_rejected() {
        let fx = fixture().await;
        let err = fx
            .store
            .create_route(&NewRoute { source: 1, destination: 99, distance: 10 })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)));

        let err = fx
            .store
            .create_flight(&NewFlight {
                route: fx.route,
                airplane: fx.airplane,
                departure_time: Utc::now(),
                arrival_time: Utc::now(),
                crew: vec![42],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)));
    }

    #[tokio::test]
    async fn test_delete_airport_cascades_to_flights_and_tickets() {
        let fx = fixture().await;
        let user = Uuid::new_v4();
        let mut ledger = fx.store.begin().await.unwrap();
        ledger
            .insert_order_with_tickets(&new_order(
                user,
                vec![TicketRequest { row: 1, seat: 1, flight: fx.flight }],
            ))
            .await
            .unwrap();
        ledger.commit().await.unwrap();

        assert!(fx.store.delete_airport(1).await.unwrap());
        assert!(fx.store.get_route(fx.route).await.unwrap().is_none());
        assert!(fx.store.get_flight(fx.flight).await.unwrap().is_none());
        assert_eq!(fx.store.ticket_count().await, 0);
        assert_eq!(fx.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_flight_keeps_orders_with_other_tickets() {
        let fx = fixture().await;
        let other = fx
            .store
            .create_flight(&NewFlight {
                route: fx.route,
                airplane: fx.airplane,
                departure_time: Utc.with_ymd_and_hms(2026, 5, 2, 8, 0, 0).unwrap(),
                arrival_time: Utc.with_ymd_and_hms(2026, 5, 2, 10, 0, 0).unwrap(),
                crew: vec![],
            })
            .await
            .unwrap();
        let user = Uuid::new_v4();
        let mut ledger = fx.store.begin().await.unwrap();
        let mixed = ledger
            .insert_order_with_tickets(&new_order(
                user,
                vec![
                    TicketRequest { row: 1, seat: 1, flight: fx.flight },
                    TicketRequest { row: 1, seat: 1, flight: other.id },
                ],
            ))
            .await
            .unwrap();
        ledger
            .insert_order_with_tickets(&new_order(
                user,
                vec![TicketRequest { row: 2, seat: 2, flight: fx.flight }],
            ))
            .await
            .unwrap();
        ledger.commit().await.unwrap();

        assert!(fx.store.delete_flight(fx.flight).await.unwrap());

        let orders = fx.store.list_orders(user).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, mixed.id);
        assert_eq!(orders[0].tickets.len(), 1);
        assert_eq!(orders[0].tickets[0].flight_id, other.id);
    }

    #[tokio::test]
    async fn test_shrinking_airplane_under_sold_seat_is_rejected() {
        let fx = fixture().await;
        let mut ledger = fx.store.begin().await.unwrap();
        ledger
            .insert_order_with_tickets(&new_order(
                Uuid::new_v4(),
                vec![TicketRequest { row: 25, seat: 6, flight: fx.flight }],
            ))
            .await
            .unwrap();
        ledger.commit().await.unwrap();

        let shrunk = NewAirplane {
            name: "UR-PSA".into(),
            rows: 1,
            seats_in_row: 1,
            airplane_type: 1,
        };
        let err = fx.store.update_airplane(fx.airplane, &shrunk).await.unwrap_err();
        assert!(matches!(err, StoreError::TicketsOutsideGrid { count: 1 }));
        let airplane = fx.store.get_airplane(fx.airplane).await.unwrap().unwrap();
        assert_eq!((airplane.rows, airplane.seats_in_row), (25, 6));

        let grown = NewAirplane { rows: 30, seats_in_row: 6, ..shrunk };
        assert!(fx.store.update_airplane(fx.airplane, &grown).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_moving_flight_to_smaller_airplane_is_rejected() {
        let fx = fixture().await;
        let small = fx
            .store
            .create_airplane(&NewAirplane {
                name: "UR-EMB".into(),
                rows: 10,
                seats_in_row: 4,
                airplane_type: 1,
            })
            .await
            .unwrap();
        let mut ledger = fx.store.begin().await.unwrap();
        ledger
            .insert_order_with_tickets(&new_order(
                Uuid::new_v4(),
                vec![TicketRequest { row: 12, seat: 2, flight: fx.flight }],
            ))
            .await
            .unwrap();
        ledger.commit().await.unwrap();

        let moved = NewFlight {
            route: fx.route,
            airplane: small.id,
            departure_time: Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap(),
            arrival_time: Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap(),
            crew: vec![],
        };
        let err = fx.store.update_flight(fx.flight, &moved).await.unwrap_err();
        assert!(matches!(err, StoreError::TicketsOutsideGrid { count: 1 }));
        let flight = fx.store.get_flight(fx.flight).await.unwrap().unwrap();
        assert_eq!(flight.airplane_id, fx.airplane);
    }

    #[tokio::test]
    async fn test_ticket_for_unknown_flight_reports_its_index() {
        let fx = fixture().await;
        let mut ledger = fx.store.begin().await.unwrap();
        let err = ledger
            .insert_order_with_tickets(&new_order(
                Uuid::new_v4(),
                vec![
                    TicketRequest { row: 1, seat: 1, flight: fx.flight },
                    TicketRequest { row: 1, seat: 1, flight: fx.flight + 50 },
                ],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownFlight { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_delete_order_frees_seats() {
        let fx = fixture().await;
        let user = Uuid::new_v4();
        let mut ledger = fx.store.begin().await.unwrap();
        let order = ledger
            .insert_order_with_tickets(&new_order(
                user,
                vec![TicketRequest { row: 5, seat: 5, flight: fx.flight }],
            ))
            .await
            .unwrap();
        ledger.commit().await.unwrap();

        assert!(!fx.store.delete_order(Uuid::new_v4(), order.id).await.unwrap());
        assert!(fx.store.delete_order(user, order.id).await.unwrap());

        let overview = fx.store.flight_overviews(&[fx.flight]).await.unwrap();
        assert_eq!(overview[0].tickets_available, 150);
        let mut ledger = fx.store.begin().await.unwrap();
        assert_eq!(ledger.count_tickets_for(fx.flight, 5, 5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_flight_list_filters_by_departure_date() {
        let fx = fixture().await;
        let on_day = FlightFilter {
            departure_date: chrono::NaiveDate::from_ymd_opt(2026, 5, 1),
            arrival_date: None,
        };
        let other_day = FlightFilter {
            departure_date: chrono::NaiveDate::from_ymd_opt(2026, 5, 2),
            arrival_date: None,
        };
        let listed = fx.store.list_flights(&on_day).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].route, "Boryspil > Chopin");
        assert_eq!(listed[0].capacity, 150);
        assert!(fx.store.list_flights(&other_day).await.unwrap().is_empty());
    }
}
