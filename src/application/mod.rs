pub mod cache;
pub mod compiler;
pub mod retry;
pub mod service;
pub mod validate;
