//! Test modules for the docshell binary.

pub mod support;
pub mod session;
pub mod cursor;
