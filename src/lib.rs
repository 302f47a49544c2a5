pub mod analysis;
pub mod core;
pub mod engine;
pub mod export;
pub mod hal;
pub mod observability;
