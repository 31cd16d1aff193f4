mod client;
mod decode;
mod metrics;
mod routes;

pub use client::HttpClient;
pub use routes::OracleModule;
