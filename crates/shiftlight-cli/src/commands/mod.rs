//! Command implementations.

mod config;
mod connect;
mod devices;
mod export;
mod scan;
mod status;
mod watch;

pub use config::cmd_config;
pub use connect::cmd_connect;
pub use devices::{cmd_clear, cmd_devices, cmd_favorite, cmd_remove, cmd_show};
pub use export::cmd_export;
pub use scan::cmd_scan;
pub use status::cmd_status;
pub use watch::cmd_watch;
