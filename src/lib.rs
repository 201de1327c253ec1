//! Workforce document-compliance backend.
//!
//! Employees upload personal documents for review, reviewers (HR and general
//! managers) approve or reject them, and managers maintain a library of
//! company policies. Every permission decision goes through [`authz`]; the
//! review state machine lives in [`lifecycle`].

pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod grants;
pub mod lifecycle;
pub mod models;
pub mod retry;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod uploads;
pub mod utils;
