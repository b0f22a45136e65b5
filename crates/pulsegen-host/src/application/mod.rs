//! Application layer: the use cases the operator surface drives.

pub mod link;

pub use link::{LinkController, LinkError};
