//! Forwarding client for the DHT storage nodes.
//!
//! Each key is owned by exactly one node, picked by hashing the key over the
//! node list. Nodes speak the same protocol as the front end itself:
//! `GET /<key>` answers 200 with the value or 404, `PUT /<key>` answers 200.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

use super::{BackendError, StorageBackend};

pub struct DhtBackend {
    nodes: Vec<String>,
    client: Client,
}

impl DhtBackend {
    /// Build a client for `nodes`. Entries without a port get `default_port`.
    pub fn new(nodes: &[String], default_port: u16) -> Result<Self, BackendError> {
        if nodes.is_empty() {
            return Err(BackendError::NoNodes);
        }

        let nodes = nodes
            .iter()
            .map(|node| node_base_url(node, default_port))
            .collect();

        Ok(Self {
            nodes,
            client: Client::new(),
        })
    }

    /// Base URLs of the storage nodes, in the order they were given.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Node responsible for `key`.
    pub fn node_for(&self, key: &str) -> &str {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.nodes.len() as u64) as usize;
        &self.nodes[index]
    }

    fn transport_error(node: &str, source: reqwest::Error) -> BackendError {
        BackendError::Transport {
            node: node.to_string(),
            source,
        }
    }
}

#[async_trait]
impl StorageBackend for DhtBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        let node = self.node_for(key);
        tracing::debug!(node = %node, key = %key, "Forwarding GET");

        let response = self
            .client
            .get(format!("{}/{}", node, key))
            .send()
            .await
            .map_err(|e| Self::transport_error(node, e))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| Self::transport_error(node, e))?;
                Ok(Some(body))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(BackendError::UnexpectedStatus {
                node: node.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), BackendError> {
        let node = self.node_for(key);
        tracing::debug!(node = %node, key = %key, size = value.len(), "Forwarding PUT");

        let response = self
            .client
            .put(format!("{}/{}", node, key))
            .body(value)
            .send()
            .await
            .map_err(|e| Self::transport_error(node, e))?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(BackendError::UnexpectedStatus {
                node: node.to_string(),
                status: response.status().as_u16(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "dht"
    }
}

fn node_base_url(node: &str, default_port: u16) -> String {
    let node = node.trim_end_matches('/');
    if node.starts_with("http://") || node.starts_with("https://") {
        return node.to_string();
    }

    // IP literals first: a bare IPv6 address is full of colons but has no port.
    if let Ok(addr) = node.parse::<SocketAddr>() {
        return format!("http://{}", addr);
    }
    let bare = node.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return format!("http://{}", SocketAddr::new(ip, default_port));
    }

    match node.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => format!("http://{}", node),
        _ => format!("http://{}:{}", node, default_port),
    }
}
