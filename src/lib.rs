//! Room-slot booking core: timezone-correct slot arithmetic, opening-hours
//! validation, availability projection, and transactional booking writes
//! behind an injected store port.

pub mod clock;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
