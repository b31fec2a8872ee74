//! Onboarding core for a remote payments/identity-verification provider.
//!
//! The provider declares, per account or person, which dotted field paths are
//! currently or eventually due. This crate compiles those requirements plus a
//! flat form submission into the provider's nested payload shape, and keeps a
//! read-through local cache of remote entity snapshots with transparent retry
//! of transient provider errors.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::cache::{ReadThroughCache, SessionFlag};
pub use application::compiler::{CompilePolicy, RequirementsCompiler};
pub use application::retry::{ErrorClass, RetryExecutor, RetryPolicy, classify};
pub use application::service::{OnboardingConfig, OnboardingService};
pub use error::{OnboardingError, ProviderError, Result};
