use clap::Parser;
use std::net::IpAddr;
use std::time::Duration;

use crate::backend::BackendKind;
use crate::harness::HarnessConfig;

/// HTTP front end for the DHT key-value store.
#[derive(Debug, Clone, Parser)]
#[command(name = "dht-frontend", version, about)]
pub struct Config {
    /// Port the HTTP server listens on
    #[arg(long, env = "DHT_FRONTEND_PORT", default_value_t = 8000)]
    pub port: u32,

    /// Address the HTTP server binds to
    #[arg(long, env = "DHT_FRONTEND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Run the self-test harness against the running server
    #[arg(long = "runtests", env = "DHT_FRONTEND_RUN_TESTS")]
    pub run_tests: bool,

    /// Where keys are stored
    #[arg(long, value_enum, env = "DHT_FRONTEND_BACKEND", default_value_t = BackendKind::Memory)]
    pub backend: BackendKind,

    /// Port used for storage nodes given without one
    #[arg(long, env = "DHT_FRONTEND_NODE_PORT", default_value_t = 8000)]
    pub node_port: u16,

    /// Number of new key/value pairs the harness writes per round
    #[arg(long, env = "DHT_FRONTEND_NUM_TESTS", default_value_t = 1000)]
    pub num_tests: usize,

    /// Harness rounds to run before stopping (0 runs until shutdown)
    #[arg(long, env = "DHT_FRONTEND_TEST_ROUNDS", default_value_t = 0)]
    pub test_rounds: usize,

    /// Pause between harness rounds
    #[arg(long, env = "DHT_FRONTEND_ROUND_PAUSE", default_value = "5s", value_parser = humantime::parse_duration)]
    pub round_pause: Duration,

    /// Pause between harness requests
    #[arg(long, env = "DHT_FRONTEND_REQUEST_PAUSE", default_value = "10ms", value_parser = humantime::parse_duration)]
    pub request_pause: Duration,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "DHT_FRONTEND_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Backend storage nodes, e.g. compute-1-1 compute-1-2
    #[arg(value_name = "NODES")]
    pub nodes: Vec<String>,
}

impl Config {
    /// Address string handed to the listener
    pub fn bind_address(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    pub fn harness(&self) -> HarnessConfig {
        HarnessConfig {
            pairs_per_round: self.num_tests,
            rounds: (self.test_rounds > 0).then_some(self.test_rounds),
            request_pause: self.request_pause,
            round_pause: self.round_pause,
        }
    }
}
