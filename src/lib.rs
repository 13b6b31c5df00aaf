pub mod aggregate;
pub mod analysis;
pub mod coords;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod seed;
pub mod selection;
pub mod storage;
pub mod web;
