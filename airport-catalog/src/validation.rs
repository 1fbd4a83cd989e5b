use airport_shared::{NewAirplane, NewAirplaneType, NewAirport, NewCrew, NewRoute};

/// Key used for errors that are not tied to a single field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl CatalogError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        CatalogError::Invalid {
            field,
            message: message.into(),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            CatalogError::Invalid { field, .. } => field,
        }
    }
}

fn check_name(field: &'static str, value: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::invalid(field, "This field may not be blank."));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(CatalogError::invalid(
            field,
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        ));
    }
    Ok(())
}

fn check_positive(field: &'static str, value: i32) -> Result<(), CatalogError> {
    if value < 1 {
        return Err(CatalogError::invalid(
            field,
            "Ensure this value is greater than or equal to 1.",
        ));
    }
    Ok(())
}

pub fn validate_crew(crew: &NewCrew) -> Result<(), CatalogError> {
    check_name("first_name", &crew.first_name)?;
    check_name("last_name", &crew.last_name)
}

pub fn validate_airport(airport: &NewAirport) -> Result<(), CatalogError> {
    check_name("name", &airport.name)?;
    check_name("closest_big_city", &airport.closest_big_city)
}

/// A route may not start and end at the same airport.
pub fn validate_route(route: &NewRoute) -> Result<(), CatalogError> {
    if route.source == route.destination {
        return Err(CatalogError::invalid(
            NON_FIELD_ERRORS,
            "Source and destination cannot be the same.",
        ));
    }
    check_positive("distance", route.distance)
}

pub fn validate_airplane_type(airplane_type: &NewAirplaneType) -> Result<(), CatalogError> {
    check_name("name", &airplane_type.name)
}

pub fn validate_airplane(airplane: &NewAirplane) -> Result<(), CatalogError> {
    check_name("name", &airplane.name)?;
    check_positive("rows", airplane.rows)?;
    check_positive("seats_in_row", airplane.seats_in_row)
}
