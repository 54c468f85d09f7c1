pub mod errors;
pub mod progress;

#[cfg(test)]
#[path = "tests/errors_tests.rs"]
mod errors_tests;
