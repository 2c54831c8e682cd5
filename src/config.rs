//! Loading of the authentication module's configuration file.
//!
//! A load walks `Opening -> Reading -> Defaulting -> Done`. Any failure moves
//! to `Failed`, and whatever was built so far (open file, draft record) is
//! dropped on the way out, so callers only ever see a complete
//! [`HbacConfig`] or a [`ConfigError`].

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use zeroize::Zeroizing;

use crate::config_error::{ConfigError, Result};
use crate::config_line::{
    owned_copy, sanitize, split_key_value, BoundedLines, ConfigKey, KeyValue, Line, Sanitized,
    MAX_LINE,
};
use crate::hbac_log_client::{emit, LogLevel, LogSink, NullSink};
use crate::host_name::{self, HostNameQuery, SystemHostName};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pam_hbac.conf";
pub const DEFAULT_URI: &str = "ldap://localhost:389";
pub const DEFAULT_SEARCH_BASE: &str = "dc=example,dc=com";
/// Seconds.
pub const DEFAULT_TIMEOUT: u32 = 5;

/// Fully resolved configuration. Read-only once returned from a load.
///
/// `uri`, `search_base` and `host_name` are never empty and `timeout` is
/// never zero. The bind password is wiped from memory when the record drops.
#[derive(Clone, PartialEq, Eq)]
pub struct HbacConfig {
    uri: String,
    bind_dn: Option<String>,
    bind_pw: Option<Zeroizing<String>>,
    search_base: String,
    host_name: String,
    timeout: u32,
}

impl HbacConfig {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn bind_dn(&self) -> Option<&str> {
        self.bind_dn.as_deref()
    }

    pub fn bind_pw(&self) -> Option<&str> {
        self.bind_pw.as_ref().map(|pw| pw.as_str())
    }

    pub fn search_base(&self) -> &str {
        &self.search_base
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Directory query timeout in seconds.
    pub fn timeout(&self) -> u32 {
        self.timeout
    }
}

impl fmt::Debug for HbacConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HbacConfig")
            .field("uri", &self.uri)
            .field("bind_dn", &self.bind_dn)
            .field("bind_pw", &self.bind_pw.as_ref().map(|_| "<redacted>"))
            .field("search_base", &self.search_base)
            .field("host_name", &self.host_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// Rendered in config-file syntax; the password is always masked.
impl fmt::Display for HbacConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "uri = {}", self.uri)?;
        writeln!(f, "search_base = {}", self.search_base)?;
        if let Some(dn) = &self.bind_dn {
            writeln!(f, "bind_dn = {}", dn)?;
        }
        if self.bind_pw.is_some() {
            writeln!(f, "bind_pw = ********")?;
        }
        writeln!(f, "host_name = {}", self.host_name)?;
        write!(f, "# timeout: {}s", self.timeout)
    }
}

/// Record under construction. Every field starts unset.
#[derive(Default)]
struct DraftConfig {
    uri: Option<String>,
    bind_dn: Option<String>,
    bind_pw: Option<Zeroizing<String>>,
    search_base: Option<String>,
    host_name: Option<String>,
    timeout: u32,
}

impl DraftConfig {
    /// Stores `value` under `key`, replacing any earlier value.
    fn set(&mut self, key: ConfigKey, value: String) {
        match key {
            ConfigKey::Uri => self.uri = Some(value),
            ConfigKey::BindDn => self.bind_dn = Some(value).filter(|v| !v.is_empty()),
            ConfigKey::BindPw => {
                let value = Zeroizing::new(value);
                self.bind_pw = Some(value).filter(|v| !v.is_empty());
            }
            ConfigKey::SearchBase => self.search_base = Some(value),
            ConfigKey::HostName => self.host_name = Some(value),
        }
    }

    /// Fills every field still unset and freezes the record.
    fn resolve(self, host_query: &dyn HostNameQuery) -> Result<HbacConfig> {
        let uri = match self.uri.filter(|v| !v.is_empty()) {
            Some(uri) => uri,
            None => default_string(DEFAULT_URI, "uri")?,
        };
        let search_base = match self.search_base.filter(|v| !v.is_empty()) {
            Some(base) => base,
            None => default_string(DEFAULT_SEARCH_BASE, "search base")?,
        };
        let host_name = match self.host_name.filter(|v| !v.is_empty()) {
            Some(name) => name,
            None => local_host_name(host_query)?,
        };
        let timeout = if self.timeout == 0 {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        };

        Ok(HbacConfig {
            uri,
            bind_dn: self.bind_dn,
            bind_pw: self.bind_pw,
            search_base,
            host_name,
            timeout,
        })
    }
}

fn default_string(value: &str, field: &str) -> Result<String> {
    owned_copy(value, "default value").map_err(|_| ConfigError::DefaultResolutionFailure {
        reason: format!("cannot allocate default {}", field),
    })
}

fn local_host_name(host_query: &dyn HostNameQuery) -> Result<String> {
    let name = host_query
        .host_name()
        .map_err(|e| ConfigError::DefaultResolutionFailure {
            reason: format!("cannot query local host name: {}", e),
        })?;
    let name = host_name::bounded(name);
    if name.is_empty() {
        return Err(ConfigError::DefaultResolutionFailure {
            reason: "local host name is empty".to_string(),
        });
    }
    Ok(name)
}

/// Stage of a single load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Opening,
    Reading,
    Defaulting,
    Done,
    Failed,
}

/// Reads a config file into an [`HbacConfig`].
///
/// The loader holds no state between loads; each call opens its own file and
/// builds its own record.
pub struct ConfigLoader<'a> {
    host_query: &'a dyn HostNameQuery,
    sink: &'a dyn LogSink,
}

impl<'a> Default for ConfigLoader<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ConfigLoader<'a> {
    pub fn new() -> Self {
        Self {
            host_query: &SystemHostName,
            sink: &NullSink,
        }
    }

    pub fn with_host_name_query(mut self, host_query: &'a dyn HostNameQuery) -> Self {
        self.host_query = host_query;
        self
    }

    pub fn with_sink(mut self, sink: &'a dyn LogSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<HbacConfig> {
        let path = path.as_ref();
        self.log(LogLevel::Debug, &format!("config file: {}", path.display()));
        self.enter(LoadState::Opening);

        let file = match File::open(path) {
            Ok(file) => file,
            Err(source) => {
                let err = ConfigError::CannotOpenFile {
                    path: path.to_path_buf(),
                    source,
                };
                self.log(LogLevel::Alert, &format!("pam_hbac: {}", err));
                return self.fail(LoadState::Opening, err);
            }
        };

        self.load_from_reader(BufReader::new(file), path)
    }

    /// Parses already-open input. `origin` labels read errors.
    pub fn load_from_reader<R: BufRead>(&self, reader: R, origin: &Path) -> Result<HbacConfig> {
        self.enter(LoadState::Reading);
        let mut draft = DraftConfig::default();
        let mut lines = BoundedLines::new(reader);

        loop {
            let line = match lines.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(source) => {
                    let err = ConfigError::ReadFailure {
                        path: origin.to_path_buf(),
                        source,
                    };
                    self.log(LogLevel::Error, &err.to_string());
                    return self.fail(LoadState::Reading, err);
                }
            };

            if line.truncated {
                self.log(
                    LogLevel::Warn,
                    &format!(
                        "line {} is longer than {} bytes; the rest was dropped",
                        line.number,
                        MAX_LINE - 1
                    ),
                );
            }

            if let Err(err) = self.read_config_line(&line, &mut draft) {
                self.log(
                    LogLevel::Error,
                    &format!("couldn't read from the config file: {}", err),
                );
                return self.fail(LoadState::Reading, err);
            }
        }

        self.enter(LoadState::Defaulting);
        let config = match draft.resolve(self.host_query) {
            Ok(config) => config,
            Err(err) => {
                self.log(LogLevel::Crit, &err.to_string());
                return self.fail(LoadState::Defaulting, err);
            }
        };

        self.enter(LoadState::Done);
        Ok(config)
    }

    fn read_config_line(&self, line: &Line, draft: &mut DraftConfig) -> Result<()> {
        let directive = match sanitize(&line.text) {
            Sanitized::Skip => return Ok(()),
            Sanitized::Directive(directive) => directive,
        };

        let kv = match split_key_value(directive, line.number) {
            Ok(kv) => kv,
            Err(err) => {
                if err.is_malformed_line() {
                    self.log(LogLevel::Error, "Malformed line; no separator");
                }
                self.log(LogLevel::Crit, &format!("cannot read config: {}", err));
                return Err(err);
            }
        };

        self.dispatch(kv, draft);
        Ok(())
    }

    // Unknown keys are ignored.
    fn dispatch(&self, kv: KeyValue, draft: &mut DraftConfig) {
        let KeyValue { key, value } = kv;
        match ConfigKey::lookup(&key) {
            Some(config_key) => {
                if !config_key.is_secret() {
                    self.log(
                        LogLevel::Debug,
                        &format!("{}: {}", config_key.label(), value),
                    );
                }
                draft.set(config_key, value);
            }
            None => self.log(LogLevel::Debug, &format!("skipping unknown key \"{}\"", key)),
        }
    }

    fn enter(&self, state: LoadState) {
        self.log(LogLevel::Debug, &format!("config load: {:?}", state));
    }

    fn fail(&self, from: LoadState, err: ConfigError) -> Result<HbacConfig> {
        self.log(
            LogLevel::Debug,
            &format!("config load: {:?} -> {:?}", from, LoadState::Failed),
        );
        Err(err)
    }

    fn log(&self, level: LogLevel, message: &str) {
        emit(self.sink, level, message);
    }
}

/// Loads `path` with the system host name and the given sink.
pub fn load_config(path: impl AsRef<Path>, sink: &dyn LogSink) -> Result<HbacConfig> {
    ConfigLoader::new().with_sink(sink).load(path)
}

/// Logs every field of `config` at debug level. The password is left out.
pub fn dump_config(config: Option<&HbacConfig>, sink: &dyn LogSink) {
    let config = match config {
        Some(config) => config,
        None => {
            emit(sink, LogLevel::Notice, "NULL config pointer");
            return;
        }
    };

    emit(sink, LogLevel::Debug, &format!("URI: {}", config.uri));
    emit(sink, LogLevel::Debug, &format!("search base {}", config.search_base));
    emit(
        sink,
        LogLevel::Debug,
        &format!("bind DN {}", config.bind_dn.as_deref().unwrap_or("(none)")),
    );
    emit(sink, LogLevel::Debug, &format!("timeout {}", config.timeout));
    emit(sink, LogLevel::Debug, &format!("client hostname {}", config.host_name));
}

/// Releases a record. Passing `None` does nothing.
pub fn release_config(config: Option<HbacConfig>) {
    drop(config);
}
