//! Plain data carried between the engine and the backend client.

pub mod match_info;

pub use match_info::*;
