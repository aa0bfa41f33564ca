//! Service Module
//!
//! The generation pipeline and the services exposed over HTTP.

pub mod cancel;
pub mod fanout;
pub mod job;
pub mod pipeline;
pub mod plan;
pub mod retry;
pub mod validator;

// Re-export for convenience
pub use job as job_service;
pub use plan as plan_service;
