mod duration;
mod serde_impl;

pub use duration::*;
