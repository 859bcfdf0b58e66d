//! External capabilities the saga depends on.

pub mod availability;
pub mod http;

pub use availability::{
    Availability, AvailabilityChecker, AvailabilityError, InMemoryAvailabilityChecker,
};
pub use http::HttpAvailabilityChecker;
