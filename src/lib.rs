pub mod backend;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod frontend;
pub mod handlers;
pub mod harness;
pub mod lifecycle;
pub mod middleware;
pub mod quota;
pub mod response;
pub mod server;

pub use backend::{BackendError, BackendKind, DhtBackend, MemoryBackend, StorageBackend};
pub use config::Config;
pub use error::{FrontendError, Result, StartupError};
pub use frontend::Frontend;
pub use harness::{Harness, HarnessConfig, HarnessError, HarnessReport};
pub use lifecycle::{RunReport, Shutdown};
pub use server::{create_app, Server};
