// Request middleware
pub mod owner;

pub use owner::*;
