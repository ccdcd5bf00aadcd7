//! crates/study_cards_core/src/page_key.rs
//!
//! Derives the stable key under which highlights for "the current logical page"
//! are grouped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub const UNKNOWN: &str = "unknown";
pub const LOCAL_FILE: &str = "local-file";
pub const BROWSER_INTERNAL: &str = "browser-internal";
pub const EXTENSION: &str = "extension";

const INTERNAL_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-search",
    "chrome-untrusted",
    "edge",
    "brave",
    "opera",
    "vivaldi",
    "about",
    "devtools",
    "view-source",
];

const EXTENSION_SCHEMES: &[&str] = &[
    "chrome-extension",
    "moz-extension",
    "safari-web-extension",
    "ms-browser-extension",
];

/// A stable identifier for a page (or site) derived from its URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(String);

impl PageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    fn sentinel(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How much of the URL participates in the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyGranularity {
    /// Hostname only: every page of a site shares one list.
    Site,
    /// Hostname plus normalized path.
    #[default]
    Page,
}

impl FromStr for KeyGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "site" => Ok(KeyGranularity::Site),
            "page" => Ok(KeyGranularity::Page),
            other => Err(format!("'{}' is not one of 'page' or 'site'", other)),
        }
    }
}

impl fmt::Display for KeyGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyGranularity::Site => f.write_str("site"),
            KeyGranularity::Page => f.write_str("page"),
        }
    }
}

/// Resolves URLs to `PageKey`s at one fixed granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageKeyResolver {
    granularity: KeyGranularity,
}

impl PageKeyResolver {
    pub fn new(granularity: KeyGranularity) -> Self {
        Self { granularity }
    }

    pub fn granularity(&self) -> KeyGranularity {
        self.granularity
    }

    /// Never fails: anything that cannot be keyed resolves to `unknown`.
    pub fn resolve(&self, url: Option<&str>) -> PageKey {
        let url = match url.map(str::trim) {
            Some(u) if !u.is_empty() => u,
            _ => return PageKey::sentinel(UNKNOWN),
        };

        if let Some(scheme) = scheme_of(url) {
            if scheme == "file" {
                return PageKey::sentinel(LOCAL_FILE);
            }
            if EXTENSION_SCHEMES.contains(&scheme.as_str()) {
                return PageKey::sentinel(EXTENSION);
            }
            if INTERNAL_SCHEMES.contains(&scheme.as_str()) {
                return PageKey::sentinel(BROWSER_INTERNAL);
            }
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return PageKey::sentinel(UNKNOWN),
        };
        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => return PageKey::sentinel(UNKNOWN),
        };

        match self.granularity {
            KeyGranularity::Site => PageKey(host.to_string()),
            KeyGranularity::Page => {
                let path = parsed.path().trim_end_matches('/');
                PageKey(format!("{}{}", host, path))
            }
        }
    }
}

fn scheme_of(url: &str) -> Option<String> {
    let (scheme, _) = url.split_once(':')?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
    valid.then(|| scheme.to_ascii_lowercase())
}
