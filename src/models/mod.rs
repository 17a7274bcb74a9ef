//! Request and Response models for the control plane API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidateRequest, ModuleIdRequest, PreloadRequest};
pub use responses::{
    ConfigResponse, ErrorResponse, HealthResponse, InvalidateResponse, ModuleResponse,
    PreloadResponse, ResetResponse, StatsResponse,
};
