pub mod batch;
pub mod builder;
pub mod error;

pub use builder::OrderBuilder;
pub use error::OrderError;
