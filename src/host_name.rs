//! Local host-name lookup used when the config file names no `host_name`.

use std::io;

/// Size of the host-name buffer, terminator included.
pub const HOST_NAME_MAX: usize = 64;

/// Source of the machine's host name.
pub trait HostNameQuery {
    fn host_name(&self) -> io::Result<String>;
}

/// Queries the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHostName;

impl HostNameQuery for SystemHostName {
    fn host_name(&self) -> io::Result<String> {
        let name = hostname::get()?;
        name.into_string().map_err(|raw| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("host name is not valid UTF-8: {:?}", raw),
            )
        })
    }
}

/// A fixed name, for callers that already know which host they run as.
#[derive(Clone, Debug)]
pub struct StaticHostName(pub String);

impl HostNameQuery for StaticHostName {
    fn host_name(&self) -> io::Result<String> {
        Ok(self.0.clone())
    }
}

/// Cuts `name` so it fits a `HOST_NAME_MAX` buffer with its terminator.
///
/// The cut lands on a character boundary at or below `HOST_NAME_MAX - 1` bytes.
pub fn bounded(mut name: String) -> String {
    let limit = HOST_NAME_MAX - 1;
    if name.len() > limit {
        let mut end = limit;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}
