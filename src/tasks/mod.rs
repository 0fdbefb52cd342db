//! Background Tasks Module
//!
//! Work the cache spawns off its lanes.
//!
//! # Tasks
//! - Write-through: forwards committed puts to the backing store

mod write_through;

pub use write_through::WriteThrough;
