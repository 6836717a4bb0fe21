// HTTP routes
pub mod health;
pub mod jobs;
pub mod stream;

pub use health::*;
pub use jobs::*;
pub use stream::*;
