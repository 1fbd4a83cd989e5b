use async_trait::async_trait;
use airport_core::{
    AirplaneRepository, AirportRepository, CrewRepository, RouteRepository, StoreError, StoreResult,
};
use airport_shared::{
    Airplane, AirplaneOverview, AirplaneType, AirplaneTypeOverview, Airport, Crew, CrewFilter,
    NameFilter, NewAirplane, NewAirplaneType, NewAirport, NewCrew, NewRoute, Route, RouteFilter,
    RouteOverview,
};

use crate::database::{db_error, like_pattern, PgStore};

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct CrewRow {
    id: i64,
    first_name: String,
    last_name: String,
}

impl From<CrewRow> for Crew {
    fn from(row: CrewRow) -> Self {
        Crew { id: row.id, first_name: row.first_name, last_name: row.last_name }
    }
}

#[derive(sqlx::FromRow)]
struct AirportRow {
    id: i64,
    name: String,
    closest_big_city: String,
}

impl From<AirportRow> for Airport {
    fn from(row: AirportRow) -> Self {
        Airport { id: row.id, name: row.name, closest_big_city: row.closest_big_city }
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: i64,
    source_id: i64,
    destination_id: i64,
    distance: i32,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: row.id,
            source_id: row.source_id,
            destination_id: row.destination_id,
            distance: row.distance,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RouteOverviewRow {
    id: i64,
    source: String,
    destination: String,
    distance: i32,
}

#[derive(sqlx::FromRow)]
struct AirplaneTypeRow {
    id: i64,
    name: String,
}

#[derive(sqlx::FromRow)]
struct AirplaneTypeOverviewRow {
    id: i64,
    name: String,
    airplanes: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct AirplaneRow {
    id: i64,
    name: String,
    rows: i32,
    seats_in_row: i32,
    airplane_type_id: i64,
}

impl From<AirplaneRow> for Airplane {
    fn from(row: AirplaneRow) -> Self {
        Airplane {
            id: row.id,
            name: row.name,
            rows: row.rows,
            seats_in_row: row.seats_in_row,
            airplane_type_id: row.airplane_type_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AirplaneOverviewRow {
    id: i64,
    name: String,
    rows: i32,
    seats_in_row: i32,
    airplane_type: String,
}

const AIRPLANE_COLUMNS: &str = r#"id, name, "rows", seats_in_row, airplane_type_id"#;

#[async_trait]
impl CrewRepository for PgStore {
    async fn list_crew(&self, filter: &CrewFilter) -> StoreResult<Vec<Crew>> {
        let rows: Vec<CrewRow> = sqlx::query_as(
            r#"
            SELECT id, first_name, last_name FROM crew
            WHERE ($1::TEXT IS NULL OR first_name ILIKE $1)
              AND ($2::TEXT IS NULL OR last_name ILIKE $2)
            ORDER BY id
            "#,
        )
        .bind(like_pattern(&filter.first_name))
        .bind(like_pattern(&filter.last_name))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Crew::from).collect())
    }

    async fn get_crew(&self, id: i64) -> StoreResult<Option<Crew>> {
        let row: Option<CrewRow> =
            sqlx::query_as("SELECT id, first_name, last_name FROM crew WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(Crew::from))
    }

    async fn create_crew(&self, crew: &NewCrew) -> StoreResult<Crew> {
        let row: CrewRow = sqlx::query_as(
            "INSERT INTO crew (first_name, last_name) VALUES ($1, $2) RETURNING id, first_name, last_name",
        )
        .bind(&crew.first_name)
        .bind(&crew.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    async fn update_crew(&self, id: i64, crew: &NewCrew) -> StoreResult<Option<Crew>> {
        let row: Option<CrewRow> = sqlx::query_as(
            "UPDATE crew SET first_name = $2, last_name = $3 WHERE id = $1 RETURNING id, first_name, last_name",
        )
        .bind(id)
        .bind(&crew.first_name)
        .bind(&crew.last_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Crew::from))
    }

    async fn delete_crew(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM crew WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AirportRepository for PgStore {
    async fn list_airports(&self, filter: &NameFilter) -> StoreResult<Vec<Airport>> {
        let rows: Vec<AirportRow> = sqlx::query_as(
            "SELECT id, name, closest_big_city FROM airports WHERE ($1::TEXT IS NULL OR name ILIKE $1) ORDER BY id",
        )
        .bind(like_pattern(&filter.name))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Airport::from).collect())
    }

    async fn get_airport(&self, id: i64) -> StoreResult<Option<Airport>> {
        let row: Option<AirportRow> =
            sqlx::query_as("SELECT id, name, closest_big_city FROM airports WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(Airport::from))
    }

    async fn create_airport(&self, airport: &NewAirport) -> StoreResult<Airport> {
        let row: AirportRow = sqlx::query_as(
            "INSERT INTO airports (name, closest_big_city) VALUES ($1, $2) RETURNING id, name, closest_big_city",
        )
        .bind(&airport.name)
        .bind(&airport.closest_big_city)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    async fn update_airport(&self, id: i64, airport: &NewAirport) -> StoreResult<Option<Airport>> {
        let row: Option<AirportRow> = sqlx::query_as(
            "UPDATE airports SET name = $2, closest_big_city = $3 WHERE id = $1 RETURNING id, name, closest_big_city",
        )
        .bind(id)
        .bind(&airport.name)
        .bind(&airport.closest_big_city)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Airport::from))
    }

    async fn delete_airport(&self, id: i64) -> StoreResult<bool> {
        self.delete_cascading("DELETE FROM airports WHERE id = $1", id).await
    }
}

#[async_trait]
impl RouteRepository for PgStore {
    async fn list_routes(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteOverview>> {
        let rows: Vec<RouteOverviewRow> = sqlx::query_as(
            r#"
            SELECT r.id, s.name AS source, d.name AS destination, r.distance
            FROM routes r
            JOIN airports s ON s.id = r.source_id
            JOIN airports d ON d.id = r.destination_id
            WHERE ($1::TEXT IS NULL OR s.name ILIKE $1)
              AND ($2::TEXT IS NULL OR d.name ILIKE $2)
            ORDER BY r.id
            "#,
        )
        .bind(like_pattern(&filter.source))
        .bind(like_pattern(&filter.destination))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| RouteOverview {
                id: row.id,
                source: row.source,
                destination: row.destination,
                distance: row.distance,
            })
            .collect())
    }

    async fn get_route(&self, id: i64) -> StoreResult<Option<Route>> {
        let row: Option<RouteRow> = sqlx::query_as(
            "SELECT id, source_id, destination_id, distance FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Route::from))
    }

    async fn create_route(&self, route: &NewRoute) -> StoreResult<Route> {
        let row: RouteRow = sqlx::query_as(
            r#"
            INSERT INTO routes (source_id, destination_id, distance) VALUES ($1, $2, $3)
            RETURNING id, source_id, destination_id, distance
            "#,
        )
        .bind(route.source)
        .bind(route.destination)
        .bind(route.distance)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    async fn update_route(&self, id: i64, route: &NewRoute) -> StoreResult<Option<Route>> {
        let row: Option<RouteRow> = sqlx::query_as(
            r#"
            UPDATE routes SET source_id = $2, destination_id = $3, distance = $4 WHERE id = $1
            RETURNING id, source_id, destination_id, distance
            "#,
        )
        .bind(id)
        .bind(route.source)
        .bind(route.destination)
        .bind(route.distance)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Route::from))
    }

    async fn delete_route(&self, id: i64) -> StoreResult<bool> {
        self.delete_cascading("DELETE FROM routes WHERE id = $1", id).await
    }
}

#[async_trait]
impl AirplaneRepository for PgStore {
    async fn list_airplane_types(&self, filter: &NameFilter) -> StoreResult<Vec<AirplaneTypeOverview>> {
        let rows: Vec<AirplaneTypeOverviewRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.name,
                   COALESCE(ARRAY_AGG(a.name::TEXT ORDER BY a.id) FILTER (WHERE a.id IS NOT NULL), '{}'::TEXT[]) AS airplanes
            FROM airplane_types t
            LEFT JOIN airplanes a ON a.airplane_type_id = t.id
            WHERE ($1::TEXT IS NULL OR t.name ILIKE $1)
            GROUP BY t.id
            ORDER BY t.id
            "#,
        )
        .bind(like_pattern(&filter.name))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| AirplaneTypeOverview { id: row.id, name: row.name, airplanes: row.airplanes })
            .collect())
    }

    async fn get_airplane_type(&self, id: i64) -> StoreResult<Option<AirplaneType>> {
        let row: Option<AirplaneTypeRow> =
            sqlx::query_as("SELECT id, name FROM airplane_types WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(|r| AirplaneType { id: r.id, name: r.name }))
    }

    async fn create_airplane_type(&self, airplane_type: &NewAirplaneType) -> StoreResult<AirplaneType> {
        let row: AirplaneTypeRow =
            sqlx::query_as("INSERT INTO airplane_types (name) VALUES ($1) RETURNING id, name")
                .bind(&airplane_type.name)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(AirplaneType { id: row.id, name: row.name })
    }

    async fn update_airplane_type(
        &self,
        id: i64,
        airplane_type: &NewAirplaneType,
    ) -> StoreResult<Option<AirplaneType>> {
        let row: Option<AirplaneTypeRow> =
            sqlx::query_as("UPDATE airplane_types SET name = $2 WHERE id = $1 RETURNING id, name")
                .bind(id)
                .bind(&airplane_type.name)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(|r| AirplaneType { id: r.id, name: r.name }))
    }

    async fn delete_airplane_type(&self, id: i64) -> StoreResult<bool> {
        self.delete_cascading("DELETE FROM airplane_types WHERE id = $1", id).await
    }

    async fn airplanes_of_type(&self, airplane_type_id: i64) -> StoreResult<Vec<Airplane>> {
        let rows: Vec<AirplaneRow> = sqlx::query_as(&format!(
            "SELECT {AIRPLANE_COLUMNS} FROM airplanes WHERE airplane_type_id = $1 ORDER BY id"
        ))
        .bind(airplane_type_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Airplane::from).collect())
    }

    async fn list_airplanes(&self, filter: &NameFilter) -> StoreResult<Vec<AirplaneOverview>> {
        let rows: Vec<AirplaneOverviewRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.name, a."rows", a.seats_in_row, t.name AS airplane_type
            FROM airplanes a
            JOIN airplane_types t ON t.id = a.airplane_type_id
            WHERE ($1::TEXT IS NULL OR a.name ILIKE $1)
            ORDER BY a.id
            "#,
        )
        .bind(like_pattern(&filter.name))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| AirplaneOverview {
                id: row.id,
                name: row.name,
                rows: row.rows,
                seats_in_row: row.seats_in_row,
                capacity: i64::from(row.rows) * i64::from(row.seats_in_row),
                airplane_type: row.airplane_type,
            })
            .collect())
    }

    async fn get_airplane(&self, id: i64) -> StoreResult<Option<Airplane>> {
        let row: Option<AirplaneRow> =
            sqlx::query_as(&format!("SELECT {AIRPLANE_COLUMNS} FROM airplanes WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(Airplane::from))
    }

    async fn create_airplane(&self, airplane: &NewAirplane) -> StoreResult<Airplane> {
        let row: AirplaneRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO airplanes (name, "rows", seats_in_row, airplane_type_id) VALUES ($1, $2, $3, $4)
            RETURNING {AIRPLANE_COLUMNS}
            "#
        ))
        .bind(&airplane.name)
        .bind(airplane.rows)
        .bind(airplane.seats_in_row)
        .bind(airplane.airplane_type)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    async fn update_airplane(&self, id: i64, airplane: &NewAirplane) -> StoreResult<Option<Airplane>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // The row lock taken by UPDATE waits for order transactions that read this airplane
        let row: Option<AirplaneRow> = sqlx::query_as(&format!(
            r#"
            UPDATE airplanes SET name = $2, "rows" = $3, seats_in_row = $4, airplane_type_id = $5
            WHERE id = $1
            RETURNING {AIRPLANE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&airplane.name)
        .bind(airplane.rows)
        .bind(airplane.seats_in_row)
        .bind(airplane.airplane_type)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(db_error)?;
            return Ok(None);
        };

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tickets t
            JOIN flights f ON f.id = t.flight_id
            WHERE f.airplane_id = $1 AND (t."row" > $2 OR t.seat > $3)
            "#,
        )
        .bind(id)
        .bind(airplane.rows)
        .bind(airplane.seats_in_row)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        if count > 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(StoreError::TicketsOutsideGrid { count });
        }

        tx.commit().await.map_err(db_error)?;
        Ok(Some(row.into()))
    }

    async fn delete_airplane(&self, id: i64) -> StoreResult<bool> {
        self.delete_cascading("DELETE FROM airplanes WHERE id = $1", id).await
    }
}
