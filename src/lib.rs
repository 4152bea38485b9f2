//! Client-side cache synchronization for the Pitchside venue booking service.
//!
//! [`hooks::DataAccess`] is the entry point: typed reads served through the
//! keyed [`cache::QueryStore`], and mutations whose success invalidates the
//! reads declared in [`cache::table`].

pub mod cache;
pub mod config;
pub mod domain;
pub mod hooks;
pub mod infra;
pub mod rpc;
