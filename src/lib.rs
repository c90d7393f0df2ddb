//! Risk matrix service.
//!
//! Stores risk matrix templates relationally and exchanges them with clients
//! in a flat `"x-y"`-keyed form.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod matrix;
pub mod web;

#[cfg(all(test, feature = "libsql"))]
pub(crate) mod testing;
