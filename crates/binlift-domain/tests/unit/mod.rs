//! Unit tests for the domain layer.

mod job_lifecycle_tests;
mod translation_tests;
