//! BookHaven library exports for the binary and integration tests

pub mod catalog;
pub mod cli;
pub mod core;

#[cfg(test)]
pub mod test_support;
