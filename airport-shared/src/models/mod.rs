pub mod catalog;
pub mod filters;
pub mod order;
