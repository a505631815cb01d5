#![doc = include_str!("../README.md")]

mod allocator;
mod cancel;
mod common;
mod lists;
mod remote_cache;
mod revoker;
pub mod store;

pub use allocator::*;
pub use common::*;
pub use lists::*;
pub use remote_cache::*;
pub use revoker::*;
pub use statuslist;
