//! Core domain types
//!
//! This module contains the core domain structures used across Plansmith services.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (which produces them) and the client/CLI (which display them).

pub mod diagram;
pub mod job;
pub mod plan;
pub mod segment;
