pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod job;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use client::{EndpointClient, PollOptions};
pub use config::Config;
pub use error::{ClientError, RunnerError};
pub use state::AppState;
