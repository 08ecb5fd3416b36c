use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

const VERSION_PATTERN: &str = r"\AQIIME 2\narchive: ([0-9]{1,2})\nframework: ((?:20[0-9]{2}|2)\.(?:[1-9][0-2]?|0)\.[0-9](?:\.dev[0-9]?)?)\z";

/// Contents of a `VERSION` file: the archive schema revision and the
/// framework release that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FormatVersion {
    pub archive: u32,
    pub framework: String,
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archive {} (framework {})", self.archive, self.framework)
    }
}

fn version_matcher() -> Option<&'static Regex> {
    static MATCHER: OnceLock<Option<Regex>> = OnceLock::new();
    MATCHER
        .get_or_init(|| Regex::new(VERSION_PATTERN).ok())
        .as_ref()
}

/// Parse the bytes of a `VERSION` file. `root` only labels the error.
pub fn parse_version(root: &str, bytes: &[u8]) -> Result<FormatVersion, ParseError> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim().replace("\r\n", "\n");
    let malformed = || ParseError::MalformedVersion {
        root: root.to_string(),
        found: trimmed.clone(),
    };

    let caps = version_matcher()
        .and_then(|matcher| matcher.captures(&trimmed))
        .ok_or_else(malformed)?;
    let archive = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .ok_or_else(malformed)?;
    let framework = caps
        .get(2)
        .map(|m| m.as_str().to_string())
        .ok_or_else(malformed)?;

    Ok(FormatVersion { archive, framework })
}
