//! Repository traits and their backends.

pub mod memory;
pub mod repository;
pub mod sled_store;

pub use memory::InMemoryStore;
pub use repository::{
    AlertRepository, FeedPlanRepository, RepositoryError, SensorRepository, TankRepository,
};
pub use sled_store::SledStore;
