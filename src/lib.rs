// purgehook - keeps CMS webhooks registered and purges the CDN on content changes
//
// The binary wires the member crates together: configuration is loaded once,
// the reconciliation engine registers webhooks, the axum router verifies and
// dispatches callbacks, and teardown runs under a deadline on shutdown.

pub mod app;
pub mod error;
pub mod server;
pub mod shutdown;

pub use app::App;
pub use error::{Result, StartupError};
pub use server::{AppState, router};
pub use shutdown::{ShutdownDeadline, TeardownOutcome, drain, shutdown_signal, teardown};

// Re-export member crates
pub use purgehook_config as config;
pub use purgehook_log as log;
pub use purgehook_webhooks as webhooks;
