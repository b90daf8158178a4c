//! Unit tests for the application layer.

mod support;

mod circuit_breaker_tests;
mod orchestrator_tests;
mod pipeline_tests;
mod retry_tests;
mod selector_tests;
mod upload_tests;
