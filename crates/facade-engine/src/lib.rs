//! Masked-edit image pipeline: mask capture, provider request building,
//! retrying invocation and the session state machine that ties them.

pub mod config;
pub mod intent;
pub mod mask;
pub mod providers;
pub mod request;
pub mod retry;
pub mod session;
pub mod transport;

pub use config::EngineConfig;
pub use providers::{build_provider, ImageProvider};
pub use retry::{RetryPolicy, RetryingInvoker};
pub use session::{AccessGate, AllowAll, EnhanceMode, SessionController, StaticGate, View};
