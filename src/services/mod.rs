pub mod index_builder;
pub mod recommendations;
pub mod similar;

pub use index_builder::{rebuild_index, spawn_periodic_rebuild};
pub use recommendations::Recommendation;
