// Configuration management module
// This file handles loading of the collector options from built-in defaults,
// an optional config file and NERVE_* environment variables
//
// Numan Thabit 2025 Nov

use anyhow::{bail, Context, Result};
use serde::{de, Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_QUERY_PATH: &str = "status/metrics";
pub const DEFAULT_CONFIG_FILE_PATH: &str = "/etc/nerve/nerve.conf.json";
pub const DEFAULT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 2;
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

// File sources reach serde with lowercased keys, so every camelCase option
// name is also accepted in its lowercased spelling.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Path queried on every service, e.g. status/metrics
    #[serde(
        default = "default_query_path",
        alias = "queryPath",
        alias = "querypath"
    )]
    pub query_path: String,
    /// Nerve discovery file
    #[serde(
        default = "default_config_file_path",
        alias = "configFilePath",
        alias = "configfilepath"
    )]
    pub config_file_path: PathBuf,
    /// Services collected in cumulative-counter mode
    #[serde(
        default,
        alias = "servicesWhitelist",
        alias = "serviceswhitelist",
        deserialize_with = "string_list"
    )]
    pub services_whitelist: Vec<String>,
    /// Collection period in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Host serving the discovered ports
    #[serde(default = "default_host")]
    pub host: String,
    /// Extra Nerve hosts (e.g. this machine's interface addresses) treated as
    /// local besides loopback and `host`
    #[serde(
        default,
        alias = "localHosts",
        alias = "localhosts",
        deserialize_with = "string_list"
    )]
    pub local_hosts: Vec<String>,
    /// Upper bound on concurrently running service queries
    #[serde(
        default = "default_max_concurrency",
        alias = "maxConcurrency",
        alias = "maxconcurrency"
    )]
    pub max_concurrency: usize,
}

fn default_query_path() -> String {
    DEFAULT_QUERY_PATH.to_string()
}

fn default_config_file_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE_PATH)
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            query_path: default_query_path(),
            config_file_path: default_config_file_path(),
            services_whitelist: Vec::new(),
            interval: DEFAULT_INTERVAL_SECS,
            timeout: DEFAULT_TIMEOUT_SECS,
            host: default_host(),
            local_hosts: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl CollectorConfig {
    /// Layer an optional file (format picked from its extension) under
    /// `NERVE_*` environment variables, e.g. `NERVE_QUERY_PATH`.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let cfg = builder
            .add_source(
                config::Environment::with_prefix("NERVE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("assemble collector configuration")?;

        let parsed: Self = cfg
            .try_deserialize()
            .context("deserialize collector configuration")?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            bail!("interval must be at least one second");
        }
        if self.timeout == 0 {
            bail!("timeout must be at least one second");
        }
        if self.max_concurrency == 0 {
            bail!("max_concurrency must be positive");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Accept `["a", "b"]`, a JSON-encoded `"[\"a\", \"b\"]"` or `"a,b"`.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringList;

    impl<'de> de::Visitor<'de> for StringList {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a list of strings or a string holding one")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            let v = v.trim();
            if v.starts_with('[') {
                return serde_json::from_str(v).map_err(E::custom);
            }
            Ok(v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect())
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                out.push(item);
            }
            Ok(out)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringList)
}
