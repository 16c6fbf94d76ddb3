//! Instruction-conditioned sentence embeddings over HTTP.
//!
//! The model loads once in the background ([`web::lifecycle`]) while the server
//! already answers health checks; embedding requests are split into chunks and
//! fanned out over a fixed worker pool ([`web::dispatch`]).

pub mod web;

pub use instructor_embed_types as types;
