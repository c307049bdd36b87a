pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::Config;
pub use error::BlogsmithError;
pub use events::StreamEvent;
pub use types::*;
