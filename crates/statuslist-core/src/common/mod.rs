pub mod error;
pub mod messages;
pub mod types;

pub use error::*;
pub use types::*;
