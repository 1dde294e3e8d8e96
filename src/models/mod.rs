//! Request and Response models for the node API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{JoinRequest, SetRequest, UpdateRequest};
pub use responses::{
    DeleteResponse, EntriesResponse, ErrorResponse, GetResponse, HealthResponse, KeysResponse,
    MapsResponse, MemberResponse, SetResponse, StatsResponse,
};
