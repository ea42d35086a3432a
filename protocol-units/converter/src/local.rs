use crate::source::{BlockSink, BlockSource};
use crate::ConvertError;
use chainport_types::block::SignedBlock;
use chainport_types::{BlockRef, CodecError};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::path::Path;
use std::sync::Arc;

mod column_families {
	pub const BLOCKS: &str = "blocks";
	pub const META: &str = "meta";
}
use column_families::*;

const HEAD_KEY: &[u8] = b"head";

fn store_err<E>(e: E) -> ConvertError
where
	E: std::error::Error + Send + Sync + 'static,
{
	ConvertError::Store(Box::new(e))
}

/// An on-disk block log backed by rocksdb, usable as both a source and a
/// sink. Blocks are keyed by big-endian height; the head reference lives
/// in a separate metadata column family.
///
/// An async access API is provided to avoid blocking async tasks. The
/// methods must be executed in the context of a Tokio runtime.
#[derive(Clone, Debug)]
pub struct LocalLog {
	inner: Arc<DB>,
}

impl LocalLog {
	pub fn open(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
		let mut options = Options::default();
		options.create_if_missing(true);
		options.create_missing_column_families(true);

		let blocks = ColumnFamilyDescriptor::new(BLOCKS, Options::default());
		let meta = ColumnFamilyDescriptor::new(META, Options::default());

		let db = DB::open_cf_descriptors(&options, path, vec![blocks, meta]).map_err(store_err)?;
		Ok(Self { inner: Arc::new(db) })
	}

	async fn get_head(&self) -> Result<Option<BlockRef>, ConvertError> {
		let db = self.inner.clone();
		tokio::task::spawn_blocking(move || {
			let cf = db.cf_handle(META).ok_or(ConvertError::Store("no meta column family".into()))?;
			let head = db.get_cf(&cf, HEAD_KEY).map_err(store_err)?;
			match head {
				Some(bytes) => {
					let head = bcs::from_bytes(&bytes)
						.map_err(|e| ConvertError::Codec(CodecError::Deserialize(e)))?;
					Ok(Some(head))
				}
				None => Ok(None),
			}
		})
		.await
		.map_err(store_err)?
	}

	async fn get_block(&self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError> {
		let db = self.inner.clone();
		tokio::task::spawn_blocking(move || {
			let cf =
				db.cf_handle(BLOCKS).ok_or(ConvertError::Store("no blocks column family".into()))?;
			let block = db.get_cf(&cf, block_num.to_be_bytes()).map_err(store_err)?;
			match block {
				Some(bytes) => {
					let block = bcs::from_bytes(&bytes)
						.map_err(|e| ConvertError::Codec(CodecError::Deserialize(e)))?;
					Ok(Some(block))
				}
				None => Ok(None),
			}
		})
		.await
		.map_err(store_err)?
	}

	async fn put_block(&self, block: &SignedBlock) -> Result<(), ConvertError> {
		let db = self.inner.clone();
		let block_num = block.block_num();
		let head = block.id()?.block_ref();
		let bytes =
			bcs::to_bytes(block).map_err(|e| ConvertError::Codec(CodecError::Serialize(e)))?;
		let head_bytes =
			bcs::to_bytes(&head).map_err(|e| ConvertError::Codec(CodecError::Serialize(e)))?;
		tokio::task::spawn_blocking(move || {
			let cf =
				db.cf_handle(BLOCKS).ok_or(ConvertError::Store("no blocks column family".into()))?;
			let meta =
				db.cf_handle(META).ok_or(ConvertError::Store("no meta column family".into()))?;
			db.put_cf(&cf, block_num.to_be_bytes(), bytes).map_err(store_err)?;
			db.put_cf(&meta, HEAD_KEY, head_bytes).map_err(store_err)?;
			Ok(())
		})
		.await
		.map_err(store_err)?
	}
}

#[async_trait::async_trait]
impl BlockSource for LocalLog {
	async fn head(&mut self) -> Result<Option<BlockRef>, ConvertError> {
		self.get_head().await
	}

	async fn read_block(&mut self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError> {
		self.get_block(block_num).await
	}

	async fn read_block_range(
		&mut self,
		starting_block_num: u64,
		count: u64,
	) -> Result<Vec<SignedBlock>, ConvertError> {
		let mut blocks = Vec::new();
		for block_num in starting_block_num..starting_block_num.saturating_add(count) {
			match self.get_block(block_num).await? {
				Some(block) => blocks.push(block),
				None => break,
			}
		}
		Ok(blocks)
	}
}

#[async_trait::async_trait]
impl BlockSink for LocalLog {
	async fn append(&mut self, block: &SignedBlock) -> Result<(), ConvertError> {
		self.put_block(block).await
	}

	async fn head(&mut self) -> Result<Option<BlockRef>, ConvertError> {
		self.get_head().await
	}

	async fn read_block(&mut self, block_num: u64) -> Result<Option<SignedBlock>, ConvertError> {
		self.get_block(block_num).await
	}

	async fn close(&mut self) -> Result<(), ConvertError> {
		let db = self.inner.clone();
		tokio::task::spawn_blocking(move || db.flush().map_err(store_err))
			.await
			.map_err(store_err)?
	}
}
