//! Staff leave requests and approvals for a multi-branch organization.

pub mod advisory;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod model;
pub mod models;
pub mod routes;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;
