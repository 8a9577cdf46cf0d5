use std::net::IpAddr;

use crate::config::Config;
use crate::error::StartupError;

/// Checks a parsed [`Config`] before anything is bound.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the whole configuration, in the order the process reports
    /// problems: nodes first, then port, then host.
    pub fn validate(config: &Config) -> Result<(), StartupError> {
        Self::validate_nodes(&config.nodes)?;
        Self::validate_port(config.port)?;
        Self::validate_host(&config.host)?;
        Ok(())
    }

    /// At least one storage node has to be named
    pub fn validate_nodes(nodes: &[String]) -> Result<(), StartupError> {
        if nodes.is_empty() {
            return Err(StartupError::NoBackendNodes);
        }

        if nodes.iter().any(|node| node.trim().is_empty()) {
            return Err(StartupError::InvalidConfiguration(
                "storage node names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Port has to fit in 16 bits. Zero asks the OS for any free port.
    pub fn validate_port(port: u32) -> Result<u16, StartupError> {
        u16::try_from(port).map_err(|_| StartupError::InvalidPort(port))
    }

    pub fn validate_host(host: &str) -> Result<(), StartupError> {
        if host.is_empty() {
            return Err(StartupError::InvalidConfiguration(
                "bind host cannot be empty".to_string(),
            ));
        }

        if host == "localhost" || host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        Err(StartupError::InvalidConfiguration(format!(
            "bind host '{}' is not an IP address",
            host
        )))
    }
}
