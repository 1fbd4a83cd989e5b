pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod flight_repo;
pub mod memory;
pub mod order_repo;
pub mod redis_repo;

pub use database::{DbClient, PgStore};
pub use memory::MemoryStore;
pub use redis_repo::RedisClient;
