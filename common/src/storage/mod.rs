pub mod artifacts;
pub mod db;
pub mod hierarchy;
pub mod stats;
pub mod types;
