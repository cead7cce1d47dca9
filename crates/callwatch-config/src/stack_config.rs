use serde::Deserialize;

/// How the process sources its raw events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RunMode {
    /// Live connection to the switch's management interface
    Ami,
    /// Replay of a recorded JSON event file
    Replay,
}

/// Connection settings for the live management interface
#[derive(Debug, Clone)]
pub struct AmiConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
    /// Seconds to wait before reconnecting after a connection loss.
    /// On reconnect the in-memory call topology is dropped and rebuilt
    /// from subsequent events.
    pub reconnect_delay_secs: u64,
}

/// Settings for replay mode
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// JSON file holding an array of raw events
    pub events_file: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: RunMode,
    /// Verbose log file, in addition to stdout logging
    pub debug_log: Option<String>,
    pub ami: Option<AmiConfig>,
    pub replay: Option<ReplayConfig>,
}
