pub mod api;
pub mod beacon;
pub mod checkpoint;
pub mod config;
pub mod health;
pub mod ingest;
pub mod registry;
pub mod scheduler;
