pub mod aggregation;
pub mod cache;
pub mod districts;
pub mod export;
pub mod sync;
pub mod upstream;
