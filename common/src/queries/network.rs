//! Queries answered by the network monitor

use crate::types::NetworkState;

pub const DEFAULT_NETWORK_QUERY_TOPIC: (&str, &str) =
    ("network-query-topic", "agora.query.network");

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum NetworkStateQuery {
    GetNetworkState,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum NetworkStateQueryResponse {
    NetworkState(NetworkState),
    Error(String),
}
