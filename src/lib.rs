pub mod config;
pub mod config_error;
pub mod config_line;
pub mod hbac_log_client;
pub mod host_name;

pub use config::{
    dump_config, load_config, release_config, ConfigLoader, HbacConfig, LoadState,
    DEFAULT_CONFIG_PATH, DEFAULT_SEARCH_BASE, DEFAULT_TIMEOUT, DEFAULT_URI,
};
pub use config_error::{ConfigError, ConfigErrorKind, Result};
pub use hbac_log_client::{LogLevel, LogSink, Logger, NullSink};
pub use host_name::{HostNameQuery, StaticHostName, SystemHostName, HOST_NAME_MAX};
