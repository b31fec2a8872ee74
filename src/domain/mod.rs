pub mod collection;
pub mod entity;
pub mod ports;
pub mod requirement;
pub mod snapshot;
