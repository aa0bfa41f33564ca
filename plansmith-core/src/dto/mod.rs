//! Data Transfer Objects
//!
//! Request and response bodies exchanged between the orchestrator HTTP API and
//! its clients. DTOs are lightweight views of domain entities shaped for the
//! polling contract.

pub mod job;
pub mod plan;
