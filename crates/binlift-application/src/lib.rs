//! # Application Layer
//!
//! Use cases and services composing the domain ports: the job manager, the
//! decompilation orchestrator, the translation pipeline, prompt management,
//! provider selection, admission control and the resilience decorators.
//!
//! Nothing here touches a driver, a socket or a file; all side effects go
//! through ports implemented by the providers layer.
#![allow(missing_docs)]

/// Provider decorators (circuit breaker, retry)
pub mod decorators;
/// Application services (selection, admission, budget, admin)
pub mod services;
/// Application use cases
pub mod use_cases;
