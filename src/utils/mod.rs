pub mod config;
pub mod fd_limit;
pub mod logger;
pub mod s3ship_toml;
pub mod secrets;

pub use config::*;
pub use fd_limit::{FDS_PER_TRANSFER, cap_workers_by_fd_limit, max_open_fds};
pub use logger::setup_logging;
pub use s3ship_toml::{S3shipToml, apply_file_to_opts, load_s3ship_toml};
pub use secrets::get_sse_key;
