//! Self-test harness.
//!
//! Drives a running front end over HTTP: every round writes a batch of fresh
//! random key/value pairs, then reads back every pair written so far and
//! compares the bodies byte for byte. Shutdown ends the run without counting
//! as a failure.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::lifecycle::Shutdown;

const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const VALUE_ALPHABET: &[u8] = b"1234567890";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// New pairs generated and written per round
    pub pairs_per_round: usize,
    /// Stop after this many rounds; `None` keeps going until shutdown
    pub rounds: Option<usize>,
    /// Pause after every request, keeps ephemeral ports from running out
    pub request_pause: Duration,
    pub round_pause: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            pairs_per_round: 1000,
            rounds: None,
            request_pause: Duration::from_millis(10),
            round_pause: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{method} {key} failed: {source}")]
    Transport {
        method: &'static str,
        key: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {key} got HTTP status code {status}")]
    Status {
        method: &'static str,
        key: String,
        status: u16,
    },

    #[error("value for {key} is not equal to retrieved value: {expected} != {actual}")]
    Mismatch {
        key: String,
        expected: String,
        actual: String,
    },
}

impl HarnessError {
    /// The service answered, but with the wrong value.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, HarnessError::Mismatch { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessReport {
    pub rounds_completed: usize,
    pub pairs_written: usize,
    pub pairs_verified: usize,
    /// Run ended because shutdown was triggered
    pub cancelled: bool,
}

impl HarnessReport {
    fn into_cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }
}

pub struct Harness {
    base_url: String,
    client: Client,
    config: HarnessConfig,
    pairs: HashMap<String, String>,
    rng: StdRng,
}

impl Harness {
    /// Harness against `base_url`, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: impl Into<String>, config: HarnessConfig) -> Self {
        Self::with_rng(base_url, config, StdRng::from_entropy())
    }

    /// Same as [`Harness::new`] with reproducible key/value generation.
    pub fn with_seed(base_url: impl Into<String>, config: HarnessConfig, seed: u64) -> Self {
        Self::with_rng(base_url, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(base_url: impl Into<String>, config: HarnessConfig, rng: StdRng) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            config,
            pairs: HashMap::new(),
            rng,
        }
    }

    /// Pairs generated so far in this run
    pub fn pairs(&self) -> &HashMap<String, String> {
        &self.pairs
    }

    /// Generate a pair whose key has not been used in this run and remember it.
    pub fn generate_pair(&mut self) -> (String, String) {
        let key = loop {
            let len = self.rng.gen_range(10..20);
            let candidate = random_string(&mut self.rng, KEY_ALPHABET, len);
            if !self.pairs.contains_key(&candidate) {
                break candidate;
            }
        };

        let len = self.rng.gen_range(20..40);
        let value = random_string(&mut self.rng, VALUE_ALPHABET, len);

        self.pairs.insert(key.clone(), value.clone());
        (key, value)
    }

    /// Run rounds until the configured count is reached, a check fails, or
    /// shutdown is triggered.
    pub async fn run(mut self, shutdown: &Shutdown) -> Result<HarnessReport, HarnessError> {
        let mut report = HarnessReport::default();

        loop {
            if self
                .config
                .rounds
                .is_some_and(|rounds| report.rounds_completed >= rounds)
            {
                return Ok(report);
            }

            tracing::info!(round = report.rounds_completed + 1, "Generating test data");
            let mut batch = Vec::with_capacity(self.config.pairs_per_round);
            for _ in 0..self.config.pairs_per_round {
                if shutdown.is_triggered() {
                    return Ok(report.into_cancelled());
                }
                batch.push(self.generate_pair());
            }

            for (key, value) in &batch {
                if shutdown.is_triggered() {
                    return Ok(report.into_cancelled());
                }
                match self.put_pair(key, value).await {
                    Ok(()) => report.pairs_written += 1,
                    Err(_) if shutdown.is_triggered() => return Ok(report.into_cancelled()),
                    Err(err) => return Err(err),
                }
                if self.pause(self.config.request_pause, shutdown).await {
                    return Ok(report.into_cancelled());
                }
            }

            report.pairs_verified = 0;
            for (key, value) in &self.pairs {
                if shutdown.is_triggered() {
                    return Ok(report.into_cancelled());
                }
                match self.check_pair(key, value).await {
                    Ok(()) => report.pairs_verified += 1,
                    Err(_) if shutdown.is_triggered() => return Ok(report.into_cancelled()),
                    Err(err) => return Err(err),
                }
                if self.pause(self.config.request_pause, shutdown).await {
                    return Ok(report.into_cancelled());
                }
            }

            report.rounds_completed += 1;
            tracing::info!(
                round = report.rounds_completed,
                pairs = self.pairs.len(),
                "Round verified"
            );

            let more_rounds = self
                .config
                .rounds
                .map_or(true, |rounds| report.rounds_completed < rounds);
            if more_rounds && self.pause(self.config.round_pause, shutdown).await {
                return Ok(report.into_cancelled());
            }
        }
    }

    async fn put_pair(&self, key: &str, value: &str) -> Result<(), HarnessError> {
        tracing::debug!(key = %key, value = %value, "PUT");

        let response = self
            .client
            .put(self.url(key))
            .body(value.to_string())
            .send()
            .await
            .map_err(|source| HarnessError::Transport {
                method: "PUT",
                key: key.to_string(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(HarnessError::Status {
                method: "PUT",
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }

    async fn check_pair(&self, key: &str, expected: &str) -> Result<(), HarnessError> {
        tracing::debug!(key = %key, value = %expected, "GET");

        let transport = |source| HarnessError::Transport {
            method: "GET",
            key: key.to_string(),
            source,
        };

        let response = self
            .client
            .get(self.url(key))
            .send()
            .await
            .map_err(transport)?;

        if response.status() != StatusCode::OK {
            return Err(HarnessError::Status {
                method: "GET",
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        if body.as_ref() != expected.as_bytes() {
            let actual = String::from_utf8_lossy(&body).into_owned();
            tracing::error!(key = %key, expected = %expected, actual = %actual, "Value mismatch");
            return Err(HarnessError::Mismatch {
                key: key.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }

        Ok(())
    }

    /// Sleep for `duration`; returns true if shutdown cut the pause short.
    async fn pause(&self, duration: Duration, shutdown: &Shutdown) -> bool {
        if duration.is_zero() {
            return shutdown.is_triggered();
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = shutdown.cancelled() => true,
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

fn random_string(rng: &mut StdRng, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .filter_map(|_| alphabet.choose(&mut *rng).map(|&b| b as char))
        .collect()
}
