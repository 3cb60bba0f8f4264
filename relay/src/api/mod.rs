pub mod fetch;
pub mod hello;
pub mod ingest;
pub mod utils;
