// Loads real files from disk and checks the record or failure each produces.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;

use hbac_config::{
    load_config, ConfigErrorKind, ConfigLoader, HbacConfig, LogLevel, LogSink, NullSink,
    StaticHostName, DEFAULT_SEARCH_BASE, DEFAULT_TIMEOUT, DEFAULT_URI,
};
use proptest::prelude::*;
use tempfile::NamedTempFile;

const HOST: &str = "ipa-client.example.com";

#[derive(Default)]
struct CapturingSink {
    lines: RefCell<Vec<(LogLevel, String)>>,
}

impl LogSink for CapturingSink {
    fn write(&self, level: LogLevel, message: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.lines.borrow_mut().push((level, message.to_string()));
        Ok(())
    }
}

fn write_config(contents: &str) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn load(path: &Path) -> hbac_config::Result<HbacConfig> {
    let host = StaticHostName(HOST.to_string());
    ConfigLoader::new().with_host_name_query(&host).load(path)
}

fn load_text(contents: &str) -> hbac_config::Result<HbacConfig> {
    let host = StaticHostName(HOST.to_string());
    ConfigLoader::new()
        .with_host_name_query(&host)
        .load_from_reader(contents.as_bytes(), Path::new("inline.conf"))
}

#[test]
fn loads_documented_example() -> io::Result<()> {
    let file = write_config(
        "# comment\n  \nuri = ldap://dc1\nsearch_base=dc=example,dc=com\nbind_dn = uid=svc\n",
    )?;
    let config = load(file.path()).map_err(io::Error::other)?;
    assert_eq!(config.uri(), "ldap://dc1");
    assert_eq!(config.search_base(), "dc=example,dc=com");
    assert_eq!(config.bind_dn(), Some("uid=svc"));
    assert_eq!(config.bind_pw(), None);
    assert_eq!(config.host_name(), HOST);
    assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
    Ok(())
}

#[test]
fn missing_file_is_cannot_open_with_alert() {
    let sink = CapturingSink::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pam_hbac.conf");

    let err = load_config(&path, &sink).unwrap_err();
    assert_eq!(err.kind(), ConfigErrorKind::CannotOpenFile);
    assert_eq!(err.severity(), LogLevel::Alert);
    assert_eq!(err.os_error_code(), Some(2)); // ENOENT
    let alerts: Vec<String> = sink
        .lines
        .borrow()
        .iter()
        .filter(|(level, _)| *level == LogLevel::Alert)
        .map(|(_, m)| m.clone())
        .collect();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("cannot open config file"));
}

#[test]
fn directory_path_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(dir.path()).unwrap_err();
    assert!(matches!(
        err.kind(),
        ConfigErrorKind::CannotOpenFile | ConfigErrorKind::ReadFailure
    ));
}

#[test]
fn comments_and_blanks_only_yield_defaults() -> io::Result<()> {
    let file = write_config("# pam_hbac\n\n   \n\t# uri = ldap://nope\n")?;
    let config = load(file.path()).map_err(io::Error::other)?;
    assert_eq!(config.uri(), DEFAULT_URI);
    assert_eq!(config.search_base(), DEFAULT_SEARCH_BASE);
    assert_eq!(config.host_name(), HOST);
    assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
    assert_eq!(config.bind_dn(), None);
    assert_eq!(config.bind_pw(), None);
    Ok(())
}

#[test]
fn single_malformed_line_fails_regardless_of_position() {
    let valid = "uri = ldap://dc1\nsearch_base = dc=ipa,dc=test\nbind_dn = uid=svc\n";
    let malformed = "no_equals_sign_here\n";

    for position in 0..=3 {
        let mut lines: Vec<&str> = valid.lines().collect();
        lines.insert(position, malformed.trim_end());
        let text = lines.join("\n") + "\n";
        let err = load_text(&text).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::MalformedLine, "position {position}");
    }
}

#[test]
fn malformed_last_line_after_many_valid_lines() {
    let mut text = String::new();
    for i in 0..500 {
        text.push_str(&format!("uri = ldap://dc{i}\n"));
    }
    text.push_str("trailing garbage");
    let err = load_text(&text).unwrap_err();
    assert_eq!(err.kind(), ConfigErrorKind::MalformedLine);
    assert!(err.to_string().contains("malformed line 501"));
}

#[test]
fn lone_malformed_line_file() -> io::Result<()> {
    let file = write_config("no_equals_sign_here\n")?;
    let err = load(file.path()).unwrap_err();
    assert_eq!(err.kind(), ConfigErrorKind::MalformedLine);
    Ok(())
}

#[test]
fn unknown_keys_are_ignored() {
    let config = load_text("foo = bar\nuri = ldap://h\ntimeout = 30\n").unwrap();
    assert_eq!(config.uri(), "ldap://h");
    assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
}

#[test]
fn comment_marker_must_lead_the_line() {
    let config = load_text("uri = ldap://h # not a comment\n").unwrap();
    assert_eq!(config.uri(), "ldap://h # not a comment");
}

#[test]
fn crlf_line_endings_are_trimmed() {
    let config = load_text("uri = ldap://h\r\nbind_dn = uid=svc\r\n").unwrap();
    assert_eq!(config.uri(), "ldap://h");
    assert_eq!(config.bind_dn(), Some("uid=svc"));
}

#[test]
fn repeated_loads_are_independent_and_equal() -> io::Result<()> {
    let file = write_config("uri = ldap://dc1\nbind_pw = hunter2\nhost_name = web01\n")?;
    let first = load(file.path()).map_err(io::Error::other)?;
    let second = load(file.path()).map_err(io::Error::other)?;
    assert_eq!(first, second);
    assert_ne!(first.uri().as_ptr(), second.uri().as_ptr());
    hbac_config::release_config(Some(first));
    assert_eq!(second.bind_pw(), Some("hunter2"));
    Ok(())
}

#[test]
fn system_host_name_is_used_by_default() {
    let expected = hostname::get().ok().and_then(|n| n.into_string().ok());
    let result = load_config_text_with_system_host("uri = ldap://h\n");
    match expected {
        Some(name) if !name.is_empty() => {
            let config = result.unwrap();
            assert!(name.starts_with(config.host_name()));
        }
        _ => assert_eq!(
            result.unwrap_err().kind(),
            ConfigErrorKind::DefaultResolutionFailure
        ),
    }
}

fn load_config_text_with_system_host(text: &str) -> hbac_config::Result<HbacConfig> {
    ConfigLoader::new()
        .with_sink(&NullSink)
        .load_from_reader(text.as_bytes(), Path::new("inline.conf"))
}

fn recognized_key() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("uri"),
        Just("bind_dn"),
        Just("bind_pw"),
        Just("search_base"),
        Just("host_name"),
    ]
}

fn field<'c>(config: &'c HbacConfig, key: &str) -> Option<&'c str> {
    match key {
        "uri" => Some(config.uri()),
        "bind_dn" => config.bind_dn(),
        "bind_pw" => config.bind_pw(),
        "search_base" => Some(config.search_base()),
        "host_name" => Some(config.host_name()),
        _ => None,
    }
}

fn flip_case(key: &str, mask: u64) -> String {
    key.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask & (1 << (i % 64)) != 0 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn last_value_wins_for_each_key(
        entries in prop::collection::vec((recognized_key(), "[a-z0-9=,:/.]{1,24}"), 1..20)
    ) {
        let text: String = entries
            .iter()
            .map(|(k, v)| format!("{k} = {v}\n"))
            .collect();
        let config = load_text(&text).unwrap();
        for (key, _) in &entries {
            let last = entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
            prop_assert_eq!(field(&config, key), last);
        }
    }

    #[test]
    fn key_matching_ignores_case(key in recognized_key(), mask in any::<u64>(), value in "[a-z0-9]{1,16}") {
        let spelled = flip_case(key, mask);
        let config = load_text(&format!("{spelled}={value}\n")).unwrap();
        prop_assert_eq!(field(&config, key), Some(value.as_str()));
    }

    #[test]
    fn unknown_keys_never_change_the_record(unknown in "[a-z]{1,3}_x[a-z]{0,6}", value in "[ -~]{0,30}") {
        let with_noise = load_text(&format!("{unknown} = {value}\nuri = ldap://h\n")).unwrap();
        let without = load_text("uri = ldap://h\n").unwrap();
        prop_assert_eq!(with_noise, without);
    }
}
