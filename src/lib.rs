// Library exports for tabstat

pub mod table;
pub mod ingest;
pub mod context;
pub mod resolve;
pub mod selector;
pub mod stats;
pub mod envelope;
pub mod render;
pub mod ops;
pub mod plot;
