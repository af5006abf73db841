pub mod csv;
pub mod hash;
pub mod store;

pub use store::{filter_healthy, Registry};
