use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::parameters::ParameterResolver;

/// Top-level keys carrying this prefix name a secret that is resolved at load.
pub const PARAMETER_PREFIX: &str = "parameterstore_";

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file {}: {source}", .path.display())]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("parameter `{0}` must be a string")]
    ParameterNotString(String),
    #[error("failed to resolve parameter `{key}`: {reason}")]
    ParameterUnresolved { key: String, reason: String },
    #[error("`{0}` is set both directly and through `parameterstore_{0}`")]
    ParameterConflict(String),
    #[error("duplicate site name `{0}`")]
    DuplicateSite(String),
    #[error("site `{name}` has an invalid url `{url}`: {reason}")]
    InvalidUrl { name: String, url: String, reason: String },
    #[error("state table name `{0}` is not a plain identifier")]
    InvalidTableName(String),
}

/// Resolved, validated configuration. Built once at startup and shared
/// read-only for the rest of the invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
    #[serde(default = "default_state_table")]
    pub state_table: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub topic_url: Option<String>,
    #[serde(default)]
    pub topic_token: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(flatten)]
    pub templates: Templates,
    /// Keys whose values came from a `parameterstore_` entry
    #[serde(skip)]
    pub resolved_secrets: BTreeSet<String>,
}

/// One endpoint to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
    /// Overrides [`Config::timeout_seconds`] for this site
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Substring the response body has to contain for the site to count as up
    #[serde(default)]
    pub expected_content: Option<String>,
}

/// Message templates used when composing a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Templates {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_downtime_detected_prefix")]
    pub downtime_detected_prefix: String,
    #[serde(default = "default_state_changed_prefix")]
    pub state_changed_prefix: String,
}

fn default_state_table() -> String {
    "site_state".into()
}

fn default_database_path() -> String {
    "notifier_state.db".into()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_greeting() -> String {
    "Hello".into()
}

fn default_downtime_detected_prefix() -> String {
    "Downtime detected:".into()
}

fn default_state_changed_prefix() -> String {
    "State changed:".into()
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            downtime_detected_prefix: default_downtime_detected_prefix(),
            state_changed_prefix: default_state_changed_prefix(),
        }
    }
}

impl SiteConfig {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into(), timeout_seconds: None, expected_content: None }
    }

    /// Effective request timeout for this site
    pub fn timeout(&self, default_seconds: u64) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(default_seconds))
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Expand `$NAME` and `${NAME}` references. Unknown names are left verbatim.
fn expand_vars(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match Some(name).filter(|n| !n.is_empty()).and_then(lookup) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('$');
                out.push_str(&after[..consumed]);
            }
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Expand environment references in top-level strings and swap every
/// `parameterstore_` entry for its resolved value under the stripped key.
/// Also returns the stripped keys, so their values are never printed.
fn resolve_table(
    table: toml::Table,
    resolver: &dyn ParameterResolver,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(toml::Table, BTreeSet<String>), Error> {
    let mut resolved = toml::Table::new();
    let mut secrets = BTreeSet::new();

    for key in table.keys() {
        if let Some(stripped) = key.strip_prefix(PARAMETER_PREFIX) {
            if table.contains_key(stripped) {
                return Err(Error::ParameterConflict(stripped.to_string()));
            }
        }
    }

    for (key, value) in table {
        if let Some(stripped) = key.strip_prefix(PARAMETER_PREFIX) {
            let toml::Value::String(name) = value else {
                return Err(Error::ParameterNotString(key));
            };
            let name = expand_vars(&name, lookup);
            let secret = resolver.resolve(&name).map_err(|e| Error::ParameterUnresolved {
                key: key.clone(),
                reason: e.to_string(),
            })?;
            resolved.insert(stripped.to_string(), toml::Value::String(secret));
            secrets.insert(stripped.to_string());
            continue;
        }

        let value = match value {
            toml::Value::String(s) => toml::Value::String(expand_vars(&s, lookup)),
            other => other,
        };
        resolved.insert(key, value);
    }

    Ok((resolved, secrets))
}

impl Config {
    /// Read, resolve and validate the config file at `path`
    pub fn from_config(
        path: impl AsRef<path::Path>,
        resolver: &dyn ParameterResolver,
    ) -> Result<Self, Error> {
        let config_path = normalize_toml_path(path.as_ref());
        let raw = fs::read_to_string(&config_path)
            .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
        Self::from_toml_str(&raw, resolver)
    }

    pub fn from_toml_str(raw: &str, resolver: &dyn ParameterResolver) -> Result<Self, Error> {
        Self::from_toml_str_with(raw, resolver, &|name| env::var(name).ok())
    }

    fn from_toml_str_with(
        raw: &str,
        resolver: &dyn ParameterResolver,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, Error> {
        let table: toml::Table = toml::from_str(raw)?;
        let (table, secrets) = resolve_table(table, resolver, lookup)?;
        let mut config = toml::Value::Table(table).try_into::<Config>()?;
        config.resolved_secrets = secrets;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if !is_plain_identifier(&self.state_table) {
            return Err(Error::InvalidTableName(self.state_table.clone()));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.name.as_str()) {
                return Err(Error::DuplicateSite(site.name.clone()));
            }

            let invalid = |reason: String| Error::InvalidUrl {
                name: site.name.clone(),
                url: site.url.clone(),
                reason,
            };
            let url = Url::parse(&site.url).map_err(|e| invalid(e.to_string()))?;
            match url.scheme() {
                "http" | "https" => {}
                other => return Err(invalid(format!("unsupported scheme `{other}`"))),
            }
        }

        Ok(())
    }

    /// `value` as it may appear in logs
    fn shown<'a>(&self, key: &str, value: &'a str) -> &'a str {
        if self.resolved_secrets.contains(key) { "<redacted>" } else { value }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Downtime notifier configuration:")?;
        write_title_1(f, "State")?;
        let templates = &self.templates;
        let topic = match &self.topic_url {
            Some(url) => self.shown("topic_url", url),
            None => "<log only>",
        };
        let token = if self.topic_token.is_some() { "<redacted>" } else { "<none>" };

        write_title_1(f, "State")?;
        write_1(f, "Database", &self.shown("database_path", &self.database_path))?;
        write_1(f, "Table", &self.shown("state_table", &self.state_table))?;
        write_title_1(f, "Notification")?;
        write_1(f, "Topic", &topic)?;
        write_1(f, "Token", &token)?;
        write_1(f, "Greeting", &self.shown("greeting", &templates.greeting))?;
        write_1(
            f,
            "Downtime prefix",
            &self.shown("downtime_detected_prefix", &templates.downtime_detected_prefix),
        )?;
        write_1(
            f,
            "State changed prefix",
            &self.shown("state_changed_prefix", &templates.state_changed_prefix),
        )?;
        write_title_1(f, "Sites")?;
        for site in &self.sites {
            let timeout = site.timeout_seconds.unwrap_or(self.timeout_seconds);
            write_2(f, &site.name, &format!("{} ({}s)", site.url, timeout))?;
        }

        Ok(())
    }
}
