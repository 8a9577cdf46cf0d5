//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Starting:      validate config → build frontend → bind listener
//! Serving:       server task + signal watcher (+ harness) in one JoinSet
//! ShuttingDown:  SIGINT/SIGTERM or harness finished → Shutdown::trigger
//!                → listener closed, in-flight requests drained
//! Stopped:       every worker joined
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

use std::net::SocketAddr;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::config_validator::ConfigValidator;
use crate::error::StartupError;
use crate::frontend::Frontend;
use crate::harness::{Harness, HarnessError, HarnessReport};
use crate::server::Server;

/// What a finished run looked like.
#[derive(Debug)]
pub struct RunReport {
    pub local_addr: SocketAddr,
    /// Outcome of the self-test harness, if it was enabled
    pub harness: Option<Result<HarnessReport, HarnessError>>,
    /// Error the HTTP server stopped with, if any
    pub server_error: Option<std::io::Error>,
}

impl RunReport {
    /// True unless the harness failed or the server died.
    pub fn is_success(&self) -> bool {
        self.server_error.is_none() && !matches!(self.harness, Some(Err(_)))
    }
}

enum WorkerExit {
    Server(std::io::Result<()>),
    Signals,
    Harness(Result<HarnessReport, HarnessError>),
}

/// Validate, bind and serve until shutdown, then wait for every worker.
///
/// Only startup problems are returned as errors; anything that goes wrong
/// after the listener is bound ends up in the [`RunReport`].
pub async fn run(config: Config, shutdown: Shutdown) -> Result<RunReport, StartupError> {
    ConfigValidator::validate(&config)?;

    let frontend = Frontend::from_config(&config)?;
    tracing::info!(
        backend = frontend.backend_name(),
        nodes = ?config.nodes,
        "Frontend initialised"
    );

    let server = Server::bind(&config, frontend).await?;
    let local_addr = server.local_addr();

    let mut workers = JoinSet::new();

    let signal_shutdown = shutdown.clone();
    workers.spawn(async move {
        signals::watch_signals(signal_shutdown).await;
        WorkerExit::Signals
    });

    let server_shutdown = shutdown.clone();
    workers.spawn(async move { WorkerExit::Server(server.run(server_shutdown).await) });

    if config.run_tests {
        tracing::info!("Running tests...");
        let harness = Harness::new(format!("http://{}", harness_target(local_addr)), config.harness());
        let harness_shutdown = shutdown.clone();
        workers.spawn(async move {
            let result = harness.run(&harness_shutdown).await;
            // Finished either way; take the server down with it.
            harness_shutdown.trigger();
            WorkerExit::Harness(result)
        });
    }

    let mut report = RunReport {
        local_addr,
        harness: None,
        server_error: None,
    };

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(WorkerExit::Server(Ok(()))) => {}
            Ok(WorkerExit::Server(Err(err))) => {
                tracing::error!(error = %err, "HTTP server failed");
                report.server_error = Some(err);
                shutdown.trigger();
            }
            Ok(WorkerExit::Signals) => {}
            Ok(WorkerExit::Harness(result)) => {
                match &result {
                    Ok(harness) if harness.cancelled => {
                        tracing::info!(rounds = harness.rounds_completed, "Test cancelled by shutdown")
                    }
                    Ok(harness) => tracing::info!(rounds = harness.rounds_completed, "Test passed!"),
                    Err(err) if err.is_mismatch() => {
                        tracing::error!(error = %err, "Test failed! Retrieved value differs")
                    }
                    Err(err) => tracing::error!(error = %err, "Test failed!"),
                }
                report.harness = Some(result);
            }
            Err(err) => {
                tracing::error!(error = %err, "Worker task panicked");
                shutdown.trigger();
            }
        }
    }

    Ok(report)
}

// A wildcard bind address cannot be dialled; talk to loopback instead.
fn harness_target(addr: SocketAddr) -> SocketAddr {
    let mut target = addr;
    if addr.ip().is_unspecified() {
        match addr {
            SocketAddr::V4(_) => target.set_ip(std::net::Ipv4Addr::LOCALHOST.into()),
            SocketAddr::V6(_) => target.set_ip(std::net::Ipv6Addr::LOCALHOST.into()),
        }
    }
    target
}
