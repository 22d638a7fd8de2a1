//! Configuration file management for bustrack.
//!
//! Reads a small YAML-like config with the feed endpoint, static data
//! paths, and server address. A missing file yields the defaults, so
//! the CLI works against the local fallback snapshot out of the box.

use std::path::Path;

/// Full configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub feed: FeedConfig,
    pub data: DataConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Live-feed endpoint. Empty means "no remote feed configured",
    /// which makes every refresh use the local fallback file.
    pub url: String,
    pub timeout_sec: u64,
    pub stale_sec: u64,
}

#[derive(Debug, Clone)]
pub struct DataConfig {
    pub trips: String,
    pub stops: String,
    pub fallback: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            feed: FeedConfig {
                url: String::new(),
                timeout_sec: 5,
                stale_sec: 60,
            },
            data: DataConfig {
                trips: "resources/trips.txt".into(),
                stops: "resources/stops.txt".into(),
                fallback: "resources/status.xml".into(),
            },
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
        }
    }
}

/// Load config from `path`. Returns the defaults if the file doesn't
/// exist or can't be read.
pub fn load(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_config(&text),
        Err(_) => Config::default(),
    }
}

/// Parse simple YAML-like config text: unindented `section:` lines
/// followed by indented `key: value` pairs. Unknown keys are ignored.
fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        if let Some((key, val)) = stripped.split_once(':') {
            let key = key.trim();
            let val = val.trim();

            if !is_indented {
                current_section = val.is_empty().then(|| key.to_string());
            } else if let Some(ref section) = current_section {
                match section.as_str() {
                    "feed" => match key {
                        "url" => {
                            if let Some(v) = parse_string_value(val) {
                                config.feed.url = v;
                            }
                        }
                        "timeout_sec" => {
                            if let Ok(v) = val.parse() {
                                config.feed.timeout_sec = v;
                            }
                        }
                        "stale_sec" => {
                            if let Ok(v) = val.parse() {
                                config.feed.stale_sec = v;
                            }
                        }
                        _ => {}
                    },
                    "data" => match key {
                        "trips" => {
                            if let Some(v) = parse_string_value(val) {
                                config.data.trips = v;
                            }
                        }
                        "stops" => {
                            if let Some(v) = parse_string_value(val) {
                                config.data.stops = v;
                            }
                        }
                        "fallback" => {
                            if let Some(v) = parse_string_value(val) {
                                config.data.fallback = v;
                            }
                        }
                        _ => {}
                    },
                    "server" => match key {
                        "host" => {
                            if let Some(v) = parse_string_value(val) {
                                config.server.host = v;
                            }
                        }
                        "port" => {
                            if let Ok(v) = val.parse() {
                                config.server.port = v;
                            }
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
    }

    config
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if (val.starts_with('"') && val.ends_with('"'))
        || (val.starts_with('\'') && val.ends_with('\''))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.feed.url.is_empty());
        assert_eq!(config.feed.stale_sec, 60);
        assert_eq!(config.feed.timeout_sec, 5);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
feed:
  url: "https://transit.example/status.xml"
  timeout_sec: 3
  stale_sec: 30

data:
  trips: "data/trips.txt"
  stops: "data/stops.txt"
  fallback: "data/status.xml"

server:
  host: "0.0.0.0"
  port: 9090
"#;
        let config = parse_config(text);
        assert_eq!(config.feed.url, "https://transit.example/status.xml");
        assert_eq!(config.feed.timeout_sec, 3);
        assert_eq!(config.feed.stale_sec, 30);
        assert_eq!(config.data.trips, "data/trips.txt");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let text = "feed:\n  url: https://transit.example/status.xml\n";
        let config = parse_config(text);
        assert_eq!(config.feed.url, "https://transit.example/status.xml");
        assert_eq!(config.feed.stale_sec, 60);
        assert_eq!(config.data.stops, "resources/stops.txt");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("absent.yaml"));
        assert!(config.feed.url.is_empty());
        assert_eq!(config.server.port, 8080);
    }
}
