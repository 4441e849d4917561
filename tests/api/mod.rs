//! HTTP endpoint tests

mod health_tests;
mod token_tests;
