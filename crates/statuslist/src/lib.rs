#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod bitlist;
#[cfg(feature = "codec")]
mod codec;
mod error;
mod status;

pub use crate::bitlist::*;
#[cfg_attr(docsrs, doc(cfg(feature = "codec")))]
#[cfg(feature = "codec")]
pub use crate::codec::*;
pub use crate::error::*;
pub use crate::status::*;
