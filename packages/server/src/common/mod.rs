// Common types shared across the application

pub mod error;
pub mod id;
pub mod secret;

pub use error::{CleanseError, Result, SessionHalt};
pub use id::{Id, JobId, OwnerId};
pub use secret::SecretString;
