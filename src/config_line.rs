//! Line-level pieces of the config parser: bounded line reading, comment and
//! blank-line detection, `key = value` splitting and the recognized-key table.

use std::io::{self, BufRead};

use zeroize::{Zeroize, Zeroizing};

use crate::config_error::{ConfigError, Result};

/// Size of the line buffer. At most `MAX_LINE - 1` content bytes of a
/// physical line are kept.
pub const MAX_LINE: usize = 1024;
pub const SEPARATOR: char = '=';
pub const COMMENT: char = '#';

const LINE_LIMIT: usize = MAX_LINE - 1;

// Same class as C isspace() in the "C" locale.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

pub fn strip(s: &str) -> &str {
    s.trim_matches(is_space)
}

/// Outcome of sanitizing one raw line.
#[derive(Debug, PartialEq, Eq)]
pub enum Sanitized<'a> {
    /// Blank or comment; nothing to parse.
    Skip,
    /// Trimmed directive text.
    Directive(&'a str),
}

pub fn sanitize(raw: &str) -> Sanitized<'_> {
    let line = strip(raw);
    if line.is_empty() || line.starts_with(COMMENT) {
        Sanitized::Skip
    } else {
        Sanitized::Directive(line)
    }
}

/// Owned key and value split out of one directive line.
#[derive(Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Splits `line` around its first separator and trims both halves.
///
/// `line_number` is only used to label a [`ConfigError::MalformedLine`].
pub fn split_key_value(line: &str, line_number: usize) -> Result<KeyValue> {
    let (key, value) = match line.split_once(SEPARATOR) {
        Some(parts) => parts,
        None => return Err(ConfigError::MalformedLine { line_number }),
    };

    Ok(KeyValue {
        key: owned_copy(strip(key), "config key")?,
        value: owned_copy(strip(value), "config value")?,
    })
}

/// Copies `s` into a new `String`, reporting allocation failure instead of
/// aborting.
pub fn owned_copy(s: &str, what: &'static str) -> Result<String> {
    let mut out = String::new();
    out.try_reserve_exact(s.len())
        .map_err(|_| ConfigError::AllocationFailure { what })?;
    out.push_str(s);
    Ok(out)
}

/// Directive names the dispatcher maps onto record fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Uri,
    BindDn,
    BindPw,
    SearchBase,
    HostName,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::Uri,
        ConfigKey::BindDn,
        ConfigKey::BindPw,
        ConfigKey::SearchBase,
        ConfigKey::HostName,
    ];

    /// Name as written in the config file.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::Uri => "uri",
            ConfigKey::BindDn => "bind_dn",
            ConfigKey::BindPw => "bind_pw",
            ConfigKey::SearchBase => "search_base",
            ConfigKey::HostName => "host_name",
        }
    }

    /// Human label used in debug output.
    pub fn label(&self) -> &'static str {
        match self {
            ConfigKey::Uri => "URI",
            ConfigKey::BindDn => "bind dn",
            ConfigKey::BindPw => "bind pw",
            ConfigKey::SearchBase => "search base",
            ConfigKey::HostName => "host name",
        }
    }

    /// Values under this key must never reach a log.
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::BindPw)
    }

    /// ASCII case-insensitive lookup.
    pub fn lookup(key: &str) -> Option<ConfigKey> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(key))
    }
}

/// One physical line as handed to the parser.
///
/// The text may carry a credential, so it is wiped when the line drops.
#[derive(Debug, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub text: Zeroizing<String>,
    /// Content past the line bound was dropped.
    pub truncated: bool,
}

/// Reads physical lines, keeping at most `MAX_LINE - 1` bytes of each.
///
/// The overflow of a long line is consumed and dropped, it never shows up as
/// a line of its own. A cut that splits a multi-byte character backs off to
/// the previous character boundary. Any other invalid UTF-8 is an
/// `InvalidData` error naming the line.
pub struct BoundedLines<R> {
    reader: R,
    buf: Zeroizing<Vec<u8>>,
    line_number: usize,
}

impl<R: BufRead> BoundedLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Zeroizing::new(Vec::with_capacity(MAX_LINE)),
            line_number: 0,
        }
    }

    pub fn next_line(&mut self) -> io::Result<Option<Line>> {
        self.buf.zeroize();
        let mut saw_any = false;
        let mut truncated = false;

        loop {
            let available = match self.reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                break; // EOF
            }
            saw_any = true;

            let (content, used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };
            let room = LINE_LIMIT - self.buf.len();
            if content.len() > room {
                truncated = true;
            }
            let take = content.len().min(room);
            self.buf.extend_from_slice(&content[..take]);
            self.reader.consume(used);

            if done {
                break;
            }
        }

        if !saw_any {
            return Ok(None);
        }
        self.line_number += 1;

        let not_utf8 = || {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {} is not valid UTF-8", self.line_number),
            )
        };
        let valid = utf8_prefix_len(&self.buf, truncated).ok_or_else(not_utf8)?;
        let text = std::str::from_utf8(&self.buf[..valid]).map_err(|_| not_utf8())?;

        Ok(Some(Line {
            number: self.line_number,
            text: Zeroizing::new(text.to_owned()),
            truncated,
        }))
    }
}

// Length of the usable UTF-8 prefix. Only a cut line may end in a partial
// character; that tail is dropped.
fn utf8_prefix_len(bytes: &[u8], truncated: bool) -> Option<usize> {
    match std::str::from_utf8(bytes) {
        Ok(_) => Some(bytes.len()),
        Err(e) if truncated && e.error_len().is_none() => Some(e.valid_up_to()),
        Err(_) => None,
    }
}
