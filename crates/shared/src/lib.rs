//! Wire types shared by the dashboard client core and its front ends.

pub mod domain;
pub mod error;
pub mod protocol;
