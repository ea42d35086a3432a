//! JSON-RPC over HTTP client for the handful of chain node calls the
//! conversion engine depends on.

use chainport_types::block::{BlockHeader, BlockId, SignedBlock};
use chainport_types::transaction::Transaction;
use chainport_types::ChainId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tracing::warn;

/// Fixed delay between connectivity probes. The client never gives up
/// on connectivity loss, only on application-level rejection.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Largest page a single `get_block_range` call may request.
pub const MAX_BLOCK_RANGE: u64 = 1000;

/// A node-reported application error carried in the JSON-RPC `error`
/// field.
#[derive(Deserialize, Debug, Clone)]
pub struct NodeError {
	pub code: i64,
	pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
	#[error("transport failure talking to the node")]
	Transport(#[from] reqwest::Error),
	#[error("node rejected the call (code {}): {}", .0.code, .0.message)]
	Node(NodeError),
	#[error("malformed node response: {0}")]
	Malformed(String),
}

impl RpcError {
	/// Transport failures and garbled responses are retried;
	/// node-reported rejections are a property of the destination state
	/// and are not.
	pub fn is_transient(&self) -> bool {
		matches!(self, RpcError::Transport(_) | RpcError::Malformed(_))
	}
}

#[derive(Serialize, Debug)]
struct JsonRpcRequest {
	jsonrpc: &'static str,
	method: String,
	params: serde_json::Value,
	id: u64,
}

impl JsonRpcRequest {
	fn new(method: &str, params: serde_json::Value) -> Self {
		Self { jsonrpc: "2.0", method: method.to_owned(), params, id: 1 }
	}
}

#[derive(Deserialize, Debug)]
struct JsonRpcResponse {
	result: Option<serde_json::Value>,
	error: Option<NodeError>,
}

#[derive(Deserialize, Debug)]
struct GetBlockRangeResponse {
	blocks: Vec<SignedBlock>,
}

#[derive(Deserialize, Debug)]
struct GetBlockHeaderResponse {
	header: Option<BlockHeader>,
}

/// Chain state reported by `database_api.get_dynamic_global_properties`.
#[derive(Deserialize, Debug, Clone)]
pub struct DynamicGlobalProperties {
	pub chain_id: ChainId,
	pub head_block_number: u64,
	pub head_block_id: BlockId,
	pub time: u64,
}

/// Witness rotation reported by `database_api.get_witness_schedule`.
#[derive(Deserialize, Debug, Clone)]
pub struct WitnessSchedule {
	pub current_shuffled_witnesses: Vec<String>,
}

/// A JSON-RPC client for one chain node endpoint.
#[derive(Clone, Debug)]
pub struct ChainRpcClient {
	client: reqwest::Client,
	url: String,
}

impl ChainRpcClient {
	pub fn new(url: &str) -> Self {
		Self { client: reqwest::Client::new(), url: url.to_owned() }
	}

	/// Constructs a client once the endpoint accepts a socket,
	/// retrying indefinitely on a fixed delay.
	pub async fn connect(url: &str) -> Result<Self, RpcError> {
		wait_until_reachable(url).await?;
		Ok(Self::new(url))
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	async fn call<T: DeserializeOwned>(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<T, RpcError> {
		let request = JsonRpcRequest::new(method, params);
		let response = self.client.post(&self.url).json(&request).send().await?;
		let body: JsonRpcResponse = response.json().await?;
		if let Some(error) = body.error {
			return Err(RpcError::Node(error));
		}
		let result = body
			.result
			.ok_or_else(|| RpcError::Malformed(format!("{method}: missing result field")))?;
		serde_json::from_value(result).map_err(|e| RpcError::Malformed(format!("{method}: {e}")))
	}

	/// Fetches up to [MAX_BLOCK_RANGE] contiguous blocks starting at the
	/// given height. A short or empty page means the node's head was
	/// reached.
	pub async fn get_block_range(
		&self,
		starting_block_num: u64,
		count: u64,
	) -> Result<Vec<SignedBlock>, RpcError> {
		let response: GetBlockRangeResponse = self
			.call(
				"block_api.get_block_range",
				serde_json::json!({
					"starting_block_num": starting_block_num,
					"count": count.min(MAX_BLOCK_RANGE),
				}),
			)
			.await?;
		Ok(response.blocks)
	}

	pub async fn get_block_header(
		&self,
		block_num: u64,
	) -> Result<Option<BlockHeader>, RpcError> {
		let response: GetBlockHeaderResponse = self
			.call("block_api.get_block_header", serde_json::json!({ "block_num": block_num }))
			.await?;
		Ok(response.header)
	}

	pub async fn get_dynamic_global_properties(
		&self,
	) -> Result<DynamicGlobalProperties, RpcError> {
		self.call("database_api.get_dynamic_global_properties", serde_json::json!({})).await
	}

	pub async fn get_witness_schedule(&self) -> Result<WitnessSchedule, RpcError> {
		self.call("database_api.get_witness_schedule", serde_json::json!({})).await
	}

	/// Submits one transaction to the node's transaction pool.
	pub async fn broadcast_transaction(&self, trx: &Transaction) -> Result<(), RpcError> {
		let params = serde_json::json!({ "trx": trx });
		let _: serde_json::Value =
			self.call("network_broadcast_api.broadcast_transaction", params).await?;
		Ok(())
	}
}

/// Blocks until a socket opens against the endpoint. The host is
/// resolved by name first, falling back to direct address parsing, and
/// probing retries indefinitely on a fixed delay.
pub async fn wait_until_reachable(url: &str) -> Result<(), RpcError> {
	let authority = host_port(url)
		.ok_or_else(|| RpcError::Malformed(format!("no host in endpoint url: {url}")))?;
	loop {
		let addrs: Vec<SocketAddr> = match lookup_host(authority.as_str()).await {
			Ok(addrs) => addrs.collect(),
			Err(_) => match authority.parse::<SocketAddr>() {
				Ok(addr) => vec![addr],
				Err(e) => {
					return Err(RpcError::Malformed(format!(
						"cannot resolve endpoint {authority}: {e}"
					)))
				}
			},
		};
		for addr in &addrs {
			if TcpStream::connect(addr).await.is_ok() {
				return Ok(());
			}
		}
		warn!(endpoint = %authority, "node endpoint unreachable, retrying");
		tokio::time::sleep(CONNECT_RETRY_DELAY).await;
	}
}

/// Extracts `host:port` from an HTTP URL, defaulting the port from the
/// scheme.
fn host_port(url: &str) -> Option<String> {
	let (scheme, rest) = url.split_once("://")?;
	let authority = rest.split(['/', '?']).next()?;
	if authority.is_empty() {
		return None;
	}
	if authority.contains(':') {
		Some(authority.to_owned())
	} else {
		let port = match scheme {
			"https" => 443,
			_ => 80,
		};
		Some(format!("{authority}:{port}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_shape_matches_the_wire_convention() -> Result<(), anyhow::Error> {
		let request =
			JsonRpcRequest::new("block_api.get_block_header", serde_json::json!({"block_num": 7}));
		let value = serde_json::to_value(&request)?;
		assert_eq!(
			value,
			serde_json::json!({
				"jsonrpc": "2.0",
				"method": "block_api.get_block_header",
				"params": {"block_num": 7},
				"id": 1,
			})
		);
		Ok(())
	}

	#[test]
	fn error_field_parses_as_node_error() -> Result<(), anyhow::Error> {
		let body: JsonRpcResponse = serde_json::from_str(
			r#"{"jsonrpc":"2.0","error":{"code":-32003,"message":"duplicate transaction"},"id":1}"#,
		)?;
		let error = body.error.expect("error field should parse");
		assert_eq!(error.code, -32003);
		assert!(body.result.is_none());
		Ok(())
	}

	#[test]
	fn host_port_extraction() {
		assert_eq!(host_port("http://node.example:8090/rpc").as_deref(), Some("node.example:8090"));
		assert_eq!(host_port("https://node.example").as_deref(), Some("node.example:443"));
		assert_eq!(host_port("http://10.0.0.1:8090").as_deref(), Some("10.0.0.1:8090"));
		assert!(host_port("not a url").is_none());
	}
}
