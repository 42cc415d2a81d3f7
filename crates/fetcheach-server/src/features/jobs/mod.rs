//! Per-job coordinator endpoints
//!
//! These are not needed by ordinary clients, which talk to `POST /` only.
//! They expose a job's coordinator directly, for external queue consumers
//! and for re-attaching to a job that is already running.

pub mod routes;

pub use routes::jobs_routes;
