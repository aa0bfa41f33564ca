//! Plansmith Core
//!
//! Core types shared by the Plansmith services.
//!
//! This crate contains:
//! - Domain types: Jobs, development plans, diagrams and explained segments
//! - DTOs: Request/response shapes for the job query surface

pub mod domain;
pub mod dto;
