pub mod api;
pub mod collector;
pub mod metrics;
pub mod model;
pub mod server;
pub mod settings;
