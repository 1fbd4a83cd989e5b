use async_trait::async_trait;
use airport_core::{FlightRepository, StoreError, StoreResult};
use airport_shared::{Crew, Flight, FlightFilter, FlightOverview, NewFlight};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use crate::database::{db_error, PgStore};

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    route_id: i64,
    airplane_id: i64,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct FlightOverviewRow {
    id: i64,
    source: String,
    destination: String,
    airplane_id: i64,
    airplane_name: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    capacity: i64,
    tickets_sold: i64,
}

impl From<FlightOverviewRow> for FlightOverview {
    fn from(row: FlightOverviewRow) -> Self {
        FlightOverview {
            id: row.id,
            route: format!("{} > {}", row.source, row.destination),
            airplane_id: row.airplane_id,
            airplane_name: row.airplane_name,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            capacity: row.capacity,
            tickets_available: row.capacity - row.tickets_sold,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CrewRow {
    id: i64,
    first_name: String,
    last_name: String,
}

const OVERVIEW_SELECT: &str = r#"
    SELECT f.id, s.name AS source, d.name AS destination,
           a.id AS airplane_id, a.name AS airplane_name,
           f.departure_time, f.arrival_time,
           (a."rows"::BIGINT * a.seats_in_row::BIGINT) AS capacity,
           COUNT(t.id) AS tickets_sold
    FROM flights f
    JOIN routes r ON r.id = f.route_id
    JOIN airports s ON s.id = r.source_id
    JOIN airports d ON d.id = r.destination_id
    JOIN airplanes a ON a.id = f.airplane_id
    LEFT JOIN tickets t ON t.flight_id = f.id
"#;

const OVERVIEW_GROUP: &str = "GROUP BY f.id, s.name, d.name, a.id ORDER BY f.id";

impl PgStore {
    async fn crew_ids(&self, flight_id: i64) -> StoreResult<Vec<i64>> {
        sqlx::query_scalar("SELECT crew_id FROM flight_crew WHERE flight_id = $1 ORDER BY crew_id")
            .bind(flight_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }
}

async fn replace_crew(
    tx: &mut Transaction<'_, Postgres>,
    flight_id: i64,
    crew: &[i64],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM flight_crew WHERE flight_id = $1")
        .bind(flight_id)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;

    sqlx::query(
        "INSERT INTO flight_crew (flight_id, crew_id) SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
    )
    .bind(flight_id)
    .bind(crew)
    .execute(&mut **tx)
    .await
    .map_err(db_error)?;
    Ok(())
}

/// Sold tickets of `flight_id` that do not fit the seat grid of `airplane_id`
async fn tickets_outside_airplane(
    tx: &mut Transaction<'_, Postgres>,
    flight_id: i64,
    airplane_id: i64,
) -> StoreResult<i64> {
    let grid: Option<(i32, i32)> =
        sqlx::query_as(r#"SELECT "rows", seats_in_row FROM airplanes WHERE id = $1 FOR SHARE"#)
            .bind(airplane_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)?;
    let Some((rows, seats_in_row)) = grid else {
        return Ok(0);
    };

    sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM tickets WHERE flight_id = $1 AND ("row" > $2 OR seat > $3)"#,
    )
    .bind(flight_id)
    .bind(rows)
    .bind(seats_in_row)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error)
}

fn dedup_crew(crew: &[i64]) -> Vec<i64> {
    let mut ids = crew.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[async_trait]
impl FlightRepository for PgStore {
    async fn list_flights(&self, filter: &FlightFilter) -> StoreResult<Vec<FlightOverview>> {
        let rows: Vec<FlightOverviewRow> = sqlx::query_as(&format!(
            r#"{OVERVIEW_SELECT}
            WHERE ($1::DATE IS NULL OR (f.departure_time AT TIME ZONE 'UTC')::DATE = $1)
              AND ($2::DATE IS NULL OR (f.arrival_time AT TIME ZONE 'UTC')::DATE = $2)
            {OVERVIEW_GROUP}"#
        ))
        .bind(filter.departure_date)
        .bind(filter.arrival_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(FlightOverview::from).collect())
    }

    async fn flight_overviews(&self, ids: &[i64]) -> StoreResult<Vec<FlightOverview>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<FlightOverviewRow> = sqlx::query_as(&format!(
            "{OVERVIEW_SELECT} WHERE f.id = ANY($1) {OVERVIEW_GROUP}"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(FlightOverview::from).collect())
    }

    async fn get_flight(&self, id: i64) -> StoreResult<Option<Flight>> {
        let row: Option<FlightRow> = sqlx::query_as(
            "SELECT id, route_id, airplane_id, departure_time, arrival_time FROM flights WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => {
                let crew_ids = self.crew_ids(row.id).await?;
                Ok(Some(Flight {
                    id: row.id,
                    route_id: row.route_id,
                    airplane_id: row.airplane_id,
                    departure_time: row.departure_time,
                    arrival_time: row.arrival_time,
                    crew_ids,
                }))
            }
            None => Ok(None),
        }
    }

    async fn create_flight(&self, flight: &NewFlight) -> StoreResult<Flight> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row: FlightRow = sqlx::query_as(
            r#"
            INSERT INTO flights (route_id, airplane_id, departure_time, arrival_time)
            VALUES ($1, $2, $3, $4)
            RETURNING id, route_id, airplane_id, departure_time, arrival_time
            "#,
        )
        .bind(flight.route)
        .bind(flight.airplane)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        let crew_ids = dedup_crew(&flight.crew);
        replace_crew(&mut tx, row.id, &crew_ids).await?;
        tx.commit().await.map_err(db_error)?;

        Ok(Flight {
            id: row.id,
            route_id: row.route_id,
            airplane_id: row.airplane_id,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            crew_ids,
        })
    }

    async fn update_flight(&self, id: i64, flight: &NewFlight) -> StoreResult<Option<Flight>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row: Option<FlightRow> = sqlx::query_as(
            r#"
            UPDATE flights SET route_id = $2, airplane_id = $3, departure_time = $4, arrival_time = $5
            WHERE id = $1
            RETURNING id, route_id, airplane_id, departure_time, arrival_time
            "#,
        )
        .bind(id)
        .bind(flight.route)
        .bind(flight.airplane)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(db_error)?;
            return Ok(None);
        };

        let count = tickets_outside_airplane(&mut tx, id, flight.airplane).await?;
        if count > 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(StoreError::TicketsOutsideGrid { count });
        }

        let crew_ids = dedup_crew(&flight.crew);
        replace_crew(&mut tx, row.id, &crew_ids).await?;
        tx.commit().await.map_err(db_error)?;

        Ok(Some(Flight {
            id: row.id,
            route_id: row.route_id,
            airplane_id: row.airplane_id,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            crew_ids,
        }))
    }

    async fn delete_flight(&self, id: i64) -> StoreResult<bool> {
        self.delete_cascading("DELETE FROM flights WHERE id = $1", id).await
    }

    async fn crew_of_flight(&self, flight_id: i64) -> StoreResult<Vec<Crew>> {
        let rows: Vec<CrewRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.first_name, c.last_name
            FROM crew c
            JOIN flight_crew fc ON fc.crew_id = c.id
            WHERE fc.flight_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| Crew { id: row.id, first_name: row.first_name, last_name: row.last_name })
            .collect())
    }
}
