//! Startup guard for platforms whose default pipe encoding is not UTF-8.

use std::collections::BTreeMap;

use crate::error::ExecError;

/// Variable that controls the interpreter's stdio encoding.
pub const ENCODING_VAR: &str = "PYTHONIOENCODING";

/// Whether pipes to the interpreter default to a legacy code page here.
pub const MIS_ENCODING_PLATFORM: bool = cfg!(windows);

/// Check the encoding variable for the current platform. A value from the
/// session configuration takes precedence over the process environment.
pub fn check_io_encoding(config_env: &BTreeMap<String, String>) -> Result<(), ExecError> {
    let inherited = std::env::var(ENCODING_VAR).ok();
    let value = config_env
        .get(ENCODING_VAR)
        .map(String::as_str)
        .or(inherited.as_deref());
    check_encoding_var(MIS_ENCODING_PLATFORM, value)
}

pub fn check_encoding_var(mis_encoding_platform: bool, value: Option<&str>) -> Result<(), ExecError> {
    if !mis_encoding_platform {
        return Ok(());
    }
    match value {
        Some(value) if names_utf8(value) => Ok(()),
        Some(value) => Err(ExecError::Encoding {
            variable: ENCODING_VAR,
            found: format!("'{}'", value),
        }),
        None => Err(ExecError::Encoding {
            variable: ENCODING_VAR,
            found: "it unset".to_string(),
        }),
    }
}

/// `utf-8`, `UTF8`, `utf_8:surrogateescape` and friends.
fn names_utf8(value: &str) -> bool {
    let encoding = value.split(':').next().unwrap_or_default();
    let normalized: String = encoding
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    normalized.eq_ignore_ascii_case("utf8")
}
