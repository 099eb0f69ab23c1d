//! Integration test suite modules

mod composition;
mod errors;
