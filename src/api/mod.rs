//! API Module
//!
//! HTTP handlers and routing for the node REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value under a key
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `PATCH /update/:key` - Set one field of a stored JSON object
//! - `GET /keys` - List live keys
//! - `GET /maps` - List named maps
//! - `/maps/:map/{set,get/:key,del/:key,update/:key,keys,entries}` - The
//!   same operations inside a named map, plus every entry of the map
//!
//! The un-namespaced key operations act on the `default` map.
//! - `GET /stats` - Cache and write-through statistics
//! - `GET /health` - Healthy, degraded or quorum lost
//! - `GET /cluster` - Members and partition ownership
//! - `POST /cluster/members` - Join a member
//! - `DELETE /cluster/members/:id` - Remove a member
//! - `POST /cluster/members/:id/down`, `/up` - Simulate a crash and restart

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
