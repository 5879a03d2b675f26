// src/tasks/mod.rs

pub mod cache_maintenance;

pub use cache_maintenance::spawn_maintenance_task;
