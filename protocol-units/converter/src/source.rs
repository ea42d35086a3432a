use crate::ConvertError;
use chainport_types::block::SignedBlock;
use chainport_types::BlockRef;

/// An ordered supplier of source-chain blocks. Reading past the head is
/// not an error; it returns `None` (a block not yet produced).
#[async_trait::async_trait]
pub trait BlockSource: Send {
	async fn head(&mut self) -> Result<Option<BlockRef>, ConvertError>;

	async fn read_block(&mut self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError>;

	async fn read_block_range(
		&mut self,
		starting_block_num: u64,
		count: u64,
	) -> Result<Vec<SignedBlock>, ConvertError>;
}

#[async_trait::async_trait]
impl BlockSource for Box<dyn BlockSource> {
	async fn head(&mut self) -> Result<Option<BlockRef>, ConvertError> {
		(**self).head().await
	}

	async fn read_block(&mut self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError> {
		(**self).read_block(block_num).await
	}

	async fn read_block_range(
		&mut self,
		starting_block_num: u64,
		count: u64,
	) -> Result<Vec<SignedBlock>, ConvertError> {
		(**self).read_block_range(starting_block_num, count).await
	}
}

/// A destination for converted blocks. A transaction-only destination
/// (a live node) submits each transaction individually and ignores the
/// block envelope.
#[async_trait::async_trait]
pub trait BlockSink: Send {
	async fn append(&mut self, block: &SignedBlock) -> Result<(), ConvertError>;

	async fn head(&mut self) -> Result<Option<BlockRef>, ConvertError>;

	/// The destination's head time, when it can report one. Used to
	/// re-stamp transaction expirations.
	async fn head_time(&mut self) -> Result<Option<u64>, ConvertError> {
		Ok(None)
	}

	/// Reads back an already-emitted block, for resume validation.
	async fn read_block(&mut self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError>;

	async fn close(&mut self) -> Result<(), ConvertError>;

	/// Destination-side application rejections recorded during
	/// broadcasting.
	fn rejected_transactions(&self) -> u64 {
		0
	}

	/// Transport-level retries performed during broadcasting.
	fn retried_broadcasts(&self) -> u64 {
		0
	}
}

#[async_trait::async_trait]
impl BlockSink for Box<dyn BlockSink> {
	async fn append(&mut self, block: &SignedBlock) -> Result<(), ConvertError> {
		(**self).append(block).await
	}

	async fn head(&mut self) -> Result<Option<BlockRef>, ConvertError> {
		(**self).head().await
	}

	async fn head_time(&mut self) -> Result<Option<u64>, ConvertError> {
		(**self).head_time().await
	}

	async fn read_block(&mut self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError> {
		(**self).read_block(block_num).await
	}

	async fn close(&mut self) -> Result<(), ConvertError> {
		(**self).close().await
	}

	fn rejected_transactions(&self) -> u64 {
		(**self).rejected_transactions()
	}

	fn retried_broadcasts(&self) -> u64 {
		(**self).retried_broadcasts()
	}
}
