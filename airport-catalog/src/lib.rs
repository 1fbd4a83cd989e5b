pub mod query;
pub mod validation;

pub use query::{CrewQuery, FlightQuery, NameQuery, RouteQuery};
pub use validation::{
    validate_airplane, validate_airplane_type, validate_airport, validate_crew, validate_route,
    CatalogError, NON_FIELD_ERRORS,
};
