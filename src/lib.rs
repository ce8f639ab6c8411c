mod routes;

pub mod annotator;
pub mod app;
pub mod broadcast;
pub mod codec;
pub mod config;
pub mod font;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod server;
pub mod stream;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use app::start_app;
