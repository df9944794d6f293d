//! Data module - export loading, cleaning and merging

pub mod loader;
pub mod magnitude;
pub mod processor;

pub use loader::DataLoader;
pub use processor::DataProcessor;
