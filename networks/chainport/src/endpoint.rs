use chainport_converter::local::LocalLog;
use chainport_converter::remote::{RemoteNodeSink, RemoteNodeSource};
use chainport_converter::source::{BlockSink, BlockSource};
use chainport_node_client::ChainRpcClient;
use std::path::PathBuf;
use tracing::info;

/// Where blocks come from or go to: a node endpoint URL or an on-disk
/// block log path.
#[derive(Clone, Debug)]
pub enum Endpoint {
	Remote(String),
	Local(PathBuf),
}

impl Endpoint {
	/// URLs with an http scheme name a node; everything else is a path.
	pub fn parse(value: &str) -> Self {
		if value.starts_with("http://") || value.starts_with("https://") {
			Endpoint::Remote(value.to_owned())
		} else {
			Endpoint::Local(PathBuf::from(value))
		}
	}

	pub async fn open_source(&self) -> Result<Box<dyn BlockSource>, anyhow::Error> {
		match self {
			Endpoint::Remote(url) => {
				info!(%url, "waiting for source node");
				let client = ChainRpcClient::connect(url).await?;
				Ok(Box::new(RemoteNodeSource::new(client)))
			}
			Endpoint::Local(path) => {
				info!(path = %path.display(), "opening source block log");
				Ok(Box::new(LocalLog::open(path)?))
			}
		}
	}

	pub async fn open_sink(&self) -> Result<Box<dyn BlockSink>, anyhow::Error> {
		match self {
			Endpoint::Remote(url) => {
				info!(%url, "waiting for destination node");
				let client = ChainRpcClient::connect(url).await?;
				Ok(Box::new(RemoteNodeSink::new(client)))
			}
			Endpoint::Local(path) => {
				info!(path = %path.display(), "opening destination block log");
				Ok(Box::new(LocalLog::open(path)?))
			}
		}
	}
}

impl std::str::FromStr for Endpoint {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Endpoint::parse(s))
	}
}
