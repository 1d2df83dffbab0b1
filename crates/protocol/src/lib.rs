//! Wire types for the device lab.
//!
//! This crate contains the serde-serializable shapes exchanged with the
//! outside world: Selenium Grid hub topology documents, Appium session
//! lists, and the request/response bodies of the device lab HTTP API.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * Lenient on input: upstream grids are inconsistent, so optional fields default
//! * Stable: Changes only when a wire format changes
//!
//! Normalization, filtering and leasing are built on top of these types in `devlab-core`.

pub mod api;
pub mod appium;
pub mod grid;

pub use api::*;
pub use appium::*;
pub use grid::*;
