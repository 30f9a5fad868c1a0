//! An OpenAPI compliance HTTP proxy: forwards traffic to an upstream,
//! validates both legs against an OpenAPI contract, can short-circuit via
//! static mock definitions, and streams/records validation outcomes.
//!
//! The three core subsystems are [`mock`] (static mock matching),
//! [`validate`] (the validator adapter and rotating report streamer), and
//! [`pipeline`] (the request/response pipeline tying them together with
//! [`transport`]).

pub mod broadcast;
pub mod config;
pub mod http_ext;
pub mod json;
pub mod mock;
pub mod pipeline;
pub mod subset;
pub mod transaction;
pub mod transport;
pub mod validate;
