// File: wavespace-core/src/test_utils/mod.rs

pub mod harness;
pub mod helpers;

pub use harness::TestLedger;
