//! HTTP API for the domain agents and the student records they read.
//!
//! ## Endpoints
//!
//! - `GET  /api/health` - Service and model backend health
//! - `GET  /api/{weather,students}/tools` - Tool catalogue of a domain
//! - `POST /api/{weather,students}/chat` - Ask a domain agent
//! - `POST /api/students` - Create a student
//! - `GET/PUT/DELETE /api/students/:id` - Read, update or delete a student
//! - `POST /api/students/:id/marks` - Record marks for a student
//! - `PUT/DELETE /api/marks/:id` - Update or delete a marks record

mod chat;
mod records;
mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
