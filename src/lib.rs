//! xiaoai-relay: local HTTP control surface for a XiaoAi smart speaker.
//!
//! - `device`: speaker gateway (MIoT cloud or mock)
//! - `controller`: passthrough calls and the single-flight relaxation scene
//! - `api`: axum routes + static front end
//! - `store`: persisted front-end config blob
//! - `config`: service settings (YAML)

pub mod api;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod store;
