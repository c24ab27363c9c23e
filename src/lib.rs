pub mod app;
pub mod error;
pub mod estimate;
pub mod handlers;
pub mod openai;
pub mod policy;
pub mod pool;
pub mod relay;
pub mod store;
pub mod translate;
pub mod upstream;
