//! Seat grid admissibility.
//!
//! A ticket may only claim a position inside its airplane's grid:
//! `1 <= row <= rows` and `1 <= seat <= seats_in_row`.

use airport_shared::SeatGrid;
use serde::Serialize;
use std::fmt;

/// Ticket field that failed the range check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatField {
    Row,
    Seat,
}

impl SeatField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatField::Row => "row",
            SeatField::Seat => "seat",
        }
    }

    /// Name of the airplane attribute bounding this field
    pub fn limit_name(&self) -> &'static str {
        match self {
            SeatField::Row => "rows",
            SeatField::Seat => "seats_in_row",
        }
    }
}

impl fmt::Display for SeatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} number must be in available range: (1, {}): (1, {max})", .field.limit_name())]
pub struct SeatRangeError {
    pub field: SeatField,
    pub value: i32,
    pub max: i32,
}

/// Checks `row` first, then `seat`; reports the first field out of range.
pub fn validate_seat(row: i32, seat: i32, grid: &SeatGrid) -> Result<(), SeatRangeError> {
    for (field, value, max) in [
        (SeatField::Row, row, grid.rows),
        (SeatField::Seat, seat, grid.seats_in_row),
    ] {
        if !(1..=max).contains(&value) {
            return Err(SeatRangeError { field, value, max });
        }
    }
    Ok(())
}
