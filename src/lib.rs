//! Token and session lifecycle service: signed access tokens, rotating
//! device-bound refresh tokens, and single-use mailed tokens for email
//! verification and password reset.

pub mod api;
pub mod auth;
pub mod cli;
pub mod mail;
pub mod purge;
pub mod session;
pub mod store;
pub mod token;
