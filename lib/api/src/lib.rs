//! REST serving surface for featx

pub mod rest;

pub use rest::{routes, RestApi};
