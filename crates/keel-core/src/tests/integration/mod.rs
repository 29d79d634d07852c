#![cfg(test)]

pub mod isolation_tests;
pub mod lifecycle_tests;
pub mod messaging_tests;
