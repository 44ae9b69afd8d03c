//! Simulated caller buffers for testing and development.
//!
//! These stand in for memory owned by a calling process, including memory
//! the device is not allowed to touch.

pub mod buffer;

pub use buffer::UserBuffer;
