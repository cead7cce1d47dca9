use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;

use super::stack_config::{AmiConfig, Config, ReplayConfig, RunMode};

const DEFAULT_AMI_PORT: u16 = 5038;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

/// Build a `Config` from a TOML configuration string
pub fn from_toml_str(toml_str: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    // Various sanity checks
    let expected_config_version = "1.0";
    if !root.config_version.eq(expected_config_version) {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, expected_config_version
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref ami) = root.ami {
        if !ami.extra.is_empty() {
            return Err(format!("Unrecognized fields: ami::{:?}", sorted_keys(&ami.extra)).into());
        }
    }
    if let Some(ref replay) = root.replay {
        if !replay.extra.is_empty() {
            return Err(format!("Unrecognized fields: replay::{:?}", sorted_keys(&replay.extra)).into());
        }
    }

    let ami = root.ami.map(|dto| AmiConfig {
        host: dto.host,
        port: dto.port.unwrap_or(DEFAULT_AMI_PORT),
        username: dto.username,
        secret: dto.secret,
        reconnect_delay_secs: dto.reconnect_delay_secs.unwrap_or(DEFAULT_RECONNECT_DELAY_SECS),
    });
    let replay = root.replay.map(|dto| ReplayConfig { events_file: dto.events_file });

    // The selected mode must come with its settings table
    match root.mode {
        RunMode::Ami if ami.is_none() => {
            return Err("mode = \"Ami\" requires an [ami] table".into());
        }
        RunMode::Replay if replay.is_none() => {
            return Err("mode = \"Replay\" requires a [replay] table".into());
        }
        _ => {}
    }

    Ok(Config {
        mode: root.mode,
        debug_log: root.debug_log,
        ami,
        replay,
    })
}

/// Build a `Config` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<Config, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build a `Config` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    let r = BufReader::new(f);
    let cfg = from_reader(r)?;
    Ok(cfg)
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    mode: RunMode,
    debug_log: Option<String>,

    #[serde(default)]
    ami: Option<AmiDto>,

    #[serde(default)]
    replay: Option<ReplayDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct AmiDto {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub secret: String,
    pub reconnect_delay_secs: Option<u64>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct ReplayDto {
    pub events_file: String,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}
