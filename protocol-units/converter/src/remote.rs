use crate::source::{BlockSink, BlockSource};
use crate::ConvertError;
use chainport_node_client::{ChainRpcClient, RpcError, MAX_BLOCK_RANGE};
use chainport_types::block::SignedBlock;
use chainport_types::BlockRef;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed delay between broadcast retries on transient failures.
const BROADCAST_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Reads source blocks from a live node over JSON-RPC. Blocks are pulled
/// in pages of up to [MAX_BLOCK_RANGE] while catching up; once a short
/// page shows the head was reached, the source stays in single-block
/// live mode.
pub struct RemoteNodeSource {
	client: ChainRpcClient,
	buffer: VecDeque<SignedBlock>,
	next_buffered: u64,
	live: bool,
}

impl RemoteNodeSource {
	pub fn new(client: ChainRpcClient) -> Self {
		Self { client, buffer: VecDeque::new(), next_buffered: 0, live: false }
	}

	pub fn client(&self) -> &ChainRpcClient {
		&self.client
	}

	async fn fill_buffer(&mut self, starting_block_num: u64) -> Result<(), ConvertError> {
		let blocks = self.client.get_block_range(starting_block_num, MAX_BLOCK_RANGE).await?;
		if (blocks.len() as u64) < MAX_BLOCK_RANGE {
			debug!(
				at = starting_block_num,
				got = blocks.len(),
				"short page, switching to live reads"
			);
			self.live = true;
		}
		self.next_buffered = starting_block_num;
		self.buffer = blocks.into();
		Ok(())
	}
}

#[async_trait::async_trait]
impl BlockSource for RemoteNodeSource {
	async fn head(&mut self) -> Result<Option<BlockRef>, ConvertError> {
		let props = self.client.get_dynamic_global_properties().await?;
		if props.head_block_number == 0 {
			return Ok(None);
		}
		Ok(Some(BlockRef { num: props.head_block_number, id: props.head_block_id }))
	}

	async fn read_block(&mut self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError> {
		// serve from the page buffer when the request continues in order
		if block_num == self.next_buffered {
			if let Some(block) = self.buffer.pop_front() {
				self.next_buffered += 1;
				return Ok(Some(block));
			}
		} else {
			self.buffer.clear();
		}

		if self.live {
			// a header probe is cheaper than a block fetch while waiting
			// at the live tip
			if self.client.get_block_header(block_num).await?.is_none() {
				return Ok(None);
			}
			let mut blocks = self.client.get_block_range(block_num, 1).await?;
			self.next_buffered = block_num + 1;
			return Ok(blocks.pop());
		}

		self.fill_buffer(block_num).await?;
		if let Some(block) = self.buffer.pop_front() {
			self.next_buffered += 1;
			return Ok(Some(block));
		}
		Ok(None)
	}

	async fn read_block_range(
		&mut self,
		starting_block_num: u64,
		count: u64,
	) -> Result<Vec<SignedBlock>, ConvertError> {
		// bypasses the buffer; used for validation reads, not streaming
		Ok(self.client.get_block_range(starting_block_num, count).await?)
	}
}

/// Submits converted history to a live node, transaction by transaction.
/// The node builds its own blocks, so the block envelope is dropped and
/// only the re-signed transactions are broadcast.
pub struct RemoteNodeSink {
	client: ChainRpcClient,
	broadcast_retry_delay: Duration,
	rejected: u64,
	retried: u64,
}

impl RemoteNodeSink {
	pub fn new(client: ChainRpcClient) -> Self {
		Self { client, broadcast_retry_delay: BROADCAST_RETRY_DELAY, rejected: 0, retried: 0 }
	}

	pub fn client(&self) -> &ChainRpcClient {
		&self.client
	}
}

#[async_trait::async_trait]
impl BlockSink for RemoteNodeSink {
	async fn append(&mut self, block: &SignedBlock) -> Result<(), ConvertError> {
		for trx in &block.transactions {
			loop {
				match self.client.broadcast_transaction(trx).await {
					Ok(()) => break,
					// an application rejection is the destination's
					// verdict on this transaction; record it and move on
					Err(RpcError::Node(e)) => {
						self.rejected += 1;
						warn!(
							block = block.block_num(),
							code = e.code,
							message = %e.message,
							"destination rejected transaction"
						);
						break;
					}
					Err(e) if e.is_transient() => {
						self.retried += 1;
						warn!(block = block.block_num(), error = %e, "broadcast failed, retrying");
						tokio::time::sleep(self.broadcast_retry_delay).await;
					}
					Err(e) => return Err(e.into()),
				}
			}
		}
		Ok(())
	}

	async fn head(&mut self) -> Result<Option<BlockRef>, ConvertError> {
		let props = self.client.get_dynamic_global_properties().await?;
		if props.head_block_number == 0 {
			return Ok(None);
		}
		Ok(Some(BlockRef { num: props.head_block_number, id: props.head_block_id }))
	}

	async fn head_time(&mut self) -> Result<Option<u64>, ConvertError> {
		let props = self.client.get_dynamic_global_properties().await?;
		Ok(Some(props.time))
	}

	async fn read_block(&mut self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError> {
		let mut blocks = self.client.get_block_range(block_num, 1).await?;
		Ok(blocks.pop())
	}

	async fn close(&mut self) -> Result<(), ConvertError> {
		Ok(())
	}

	fn rejected_transactions(&self) -> u64 {
		self.rejected
	}

	fn retried_broadcasts(&self) -> u64 {
		self.retried
	}
}
