use std::net::SocketAddr;

use serde::Deserialize;
use stagemeter_core::error::{Result, StagemeterError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagemeterConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for StagemeterConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl StagemeterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(StagemeterError::UnsupportedVersion);
        }

        let server = self.server.addr()?;
        let metrics = self.metrics.addr()?;

        // Port 0 asks the OS for a free port, so it can never collide.
        if server.port() != 0 && server.port() == metrics.port() {
            return Err(StagemeterError::BadRequest(
                "metrics.listen port must differ from server.listen port".into(),
            ));
        }
        Ok(())
    }
}

/// Where the demo host serves `/predict`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_server_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_server_listen(),
        }
    }
}

impl ServerSection {
    pub fn addr(&self) -> Result<SocketAddr> {
        parse_addr("server.listen", &self.listen)
    }
}

/// Where the exposition endpoint serves `/metrics`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            listen: default_metrics_listen(),
        }
    }
}

impl MetricsSection {
    pub fn addr(&self) -> Result<SocketAddr> {
        parse_addr("metrics.listen", &self.listen)
    }
}

fn parse_addr(field: &str, s: &str) -> Result<SocketAddr> {
    s.parse().map_err(|_| {
        StagemeterError::BadRequest(format!("{field} must be a valid SocketAddr: {s:?}"))
    })
}

fn default_server_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_metrics_listen() -> String {
    "0.0.0.0:8001".into()
}
