//! HTTP surface of plasticflow: tenant middleware, routes, and JSON mapping.

pub mod app;
pub mod context;
pub mod middleware;
