// src/lib.rs

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod eventbus;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use db::Database;
pub use wavespace_common::error::Error;
pub use wavespace_common::models;
