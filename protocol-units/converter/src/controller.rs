use crate::block::BlockConverter;
use crate::source::{BlockSink, BlockSource};
use crate::tapos::DestinationHead;
use crate::ConvertError;
use chainport_signing::{classify, recover_public};
use chainport_types::transaction::Transaction;
use chainport_types::BlockRef;
use std::time::Duration;
use tokio::task::yield_now;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed delay before re-reading a block the source has not produced
/// yet, and before retrying a transiently failed call.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Derivation indices tried when matching a destination signature back
/// to the master secret during resume validation. Bounds the one-time
/// continuity search; a signer past this index is reported as a
/// mismatch.
pub const DEFAULT_RESUME_SEARCH_LIMIT: usize = 100_000;

/// Conversion run parameters. Heights are in the source chain's
/// numbering; `stop_block` of `None` means the source head observed at
/// startup.
#[derive(Clone, Debug)]
pub struct ConversionConfig {
	pub start_block: u64,
	pub stop_block: Option<u64>,
	/// Progress is logged every this many converted blocks.
	pub log_every: u64,
	pub retry_delay: Duration,
	pub resume_search_limit: usize,
}

impl Default for ConversionConfig {
	fn default() -> Self {
		Self {
			start_block: 1,
			stop_block: None,
			log_every: 10_000,
			retry_delay: DEFAULT_RETRY_DELAY,
			resume_search_limit: DEFAULT_RESUME_SEARCH_LIMIT,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControllerState {
	Uninitialized,
	Validating,
	Converting,
	Draining,
	Closed,
}

/// Outcome of a conversion run. A run interrupted by cancellation is
/// still a successful run; the report says so.
#[derive(Clone, Debug, Default)]
pub struct ConversionReport {
	pub blocks_converted: u64,
	pub transactions_processed: u64,
	pub rejected_transactions: u64,
	pub retried_broadcasts: u64,
	pub interrupted: bool,
	/// The run ended below the second-authority cutoff, so injection is
	/// incomplete until a later resume passes it.
	pub stopped_before_cutoff: bool,
	pub last_block: Option<BlockRef>,
}

/// Drives a conversion from a block source into a block sink: resume
/// validation, the sequential per-block conversion loop, retry handling,
/// and the final drain.
pub struct ConversionController<S, K> {
	config: ConversionConfig,
	converter: BlockConverter,
	source: S,
	sink: K,
	state: ControllerState,
}

impl<S, K> ConversionController<S, K>
where
	S: BlockSource,
	K: BlockSink,
{
	pub fn new(config: ConversionConfig, converter: BlockConverter, source: S, sink: K) -> Self {
		Self { config, converter, source, sink, state: ControllerState::Uninitialized }
	}

	fn set_state(&mut self, state: ControllerState) {
		debug!(from = ?self.state, to = ?state, "controller state change");
		self.state = state;
	}

	/// Runs the conversion to completion, to the stop height, or until
	/// the token is cancelled. Cancellation finishes the in-flight block
	/// and drains; it is not an error.
	pub async fn run(mut self, shutdown: CancellationToken) -> Result<ConversionReport, ConvertError> {
		self.set_state(ControllerState::Validating);
		let source_head = self.source.head().await?.ok_or(ConvertError::EmptySource)?;
		let stop = self.config.stop_block.unwrap_or(source_head.num);
		let mut next = self.config.start_block.max(1);

		if let Some(validated) = self.validate_resume().await? {
			info!(block = %validated, "destination history validated, resuming after it");
			next = next.max(validated.num + 1);
		}

		self.set_state(ControllerState::Converting);
		info!(from = next, to = stop, source_head = %source_head, "conversion starting");
		let total = stop.saturating_sub(next).saturating_add(1);
		let log_every = self.config.log_every.max(1);

		let mut report = ConversionReport::default();
		while next <= stop {
			if shutdown.is_cancelled() {
				info!(block = next, "shutdown requested, stopping before this block");
				report.interrupted = true;
				break;
			}
			match self.convert_one(next).await {
				Ok(Some((transactions, emitted))) => {
					report.blocks_converted += 1;
					report.transactions_processed += transactions;
					report.last_block = Some(emitted);
					if report.blocks_converted % log_every == 0 {
						info!(
							block = next,
							converted = report.blocks_converted,
							transactions = report.transactions_processed,
							progress = %format_args!(
								"{}%",
								progress_percent(report.blocks_converted, total)
							),
							"conversion progress"
						);
					}
					next += 1;
				}
				// not produced yet; wait without advancing
				Ok(None) => {
					debug!(block = next, "block not yet available, waiting");
					tokio::time::sleep(self.config.retry_delay).await;
				}
				Err(ConvertError::Rpc(e)) if e.is_transient() => {
					warn!(block = next, error = %e, "transient node failure, retrying block");
					tokio::time::sleep(self.config.retry_delay).await;
				}
				Err(e) => return Err(e),
			}
			yield_now().await;
		}

		self.set_state(ControllerState::Draining);
		let reached = next.saturating_sub(1);
		let cutoff = self.converter.second_authority().cutoff_height();
		if !self.converter.second_authority().is_empty() && reached < cutoff {
			report.stopped_before_cutoff = true;
			warn!(
				reached,
				cutoff,
				"run stopped before the second-authority cutoff; resume past it before treating the chain as administratively controllable"
			);
		}
		self.sink.close().await?;
		report.rejected_transactions = self.sink.rejected_transactions();
		report.retried_broadcasts = self.sink.retried_broadcasts();
		self.set_state(ControllerState::Closed);
		info!(
			converted = report.blocks_converted,
			transactions = report.transactions_processed,
			rejected = report.rejected_transactions,
			retried = report.retried_broadcasts,
			interrupted = report.interrupted,
			"conversion finished"
		);
		Ok(report)
	}

	async fn convert_one(&mut self, height: u64) -> Result<Option<(u64, BlockRef)>, ConvertError> {
		let Some(block) = self.source.read_block(height).await? else {
			return Ok(None);
		};
		let dest_head = if self.converter.wants_tapos_refresh(height) {
			match self.sink.head().await? {
				Some(block) => {
					let time = self.sink.head_time().await?;
					Some(DestinationHead { block, time })
				}
				None => None,
			}
		} else {
			None
		};
		let transactions = block.transactions.len() as u64;
		let converted = self.converter.convert_block(block, dest_head).await?;
		self.sink.append(&converted).await?;
		Ok(Some((transactions, converted.id()?.block_ref())))
	}

	/// Establishes that a non-empty destination was produced under the
	/// same master secret and chain identity as this run. Walks backward
	/// from the destination head until a signed transaction is found and
	/// byte-compares each of its signatures against an independent
	/// re-derivation from the master secret. Witness signatures and
	/// block numbering are never consulted: a live destination node
	/// signs its own blocks and numbers them independently of the
	/// source.
	async fn validate_resume(&mut self) -> Result<Option<BlockRef>, ConvertError> {
		let Some(dest_head) = self.sink.head().await? else {
			return Ok(None);
		};

		let mut found = None;
		for height in (1..=dest_head.num).rev() {
			if let Some(block) = self.sink.read_block(height).await? {
				if let Some(tx) =
					block.transactions.iter().rev().find(|tx| !tx.signatures.is_empty())
				{
					found = Some(tx.clone());
					break;
				}
			}
		}

		match found {
			Some(tx) => self.check_transaction_continuity(&tx)?,
			None => warn!(
				head = %dest_head,
				"destination history carries no signed transactions; continuity cannot be checked"
			),
		}

		self.converter.set_destination_head(Some(dest_head));
		self.converter.touch(dest_head.num, &dest_head.id);
		Ok(Some(dest_head))
	}

	/// Every signature on the transaction must be byte-identical to what
	/// this run's master secret would produce: recover the substitute
	/// key from the signature, locate its derivation index, and re-sign
	/// the same digest in the same canonical form. Signing is
	/// deterministic, so the comparison is exact.
	fn check_transaction_continuity(&self, tx: &Transaction) -> Result<(), ConvertError> {
		let digest = tx.signing_digest(self.converter.new_chain_id())?;
		let registry = self.converter.registry();
		let registry = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		for signature in &tx.signatures {
			// a signature that does not even recover was not produced here
			let signer = recover_public(&digest, signature)
				.map_err(|_| ConvertError::ChainIdentityMismatch)?;
			let derived = registry
				.match_derived(&signer, self.config.resume_search_limit)
				.ok_or(ConvertError::ChainIdentityMismatch)?;
			let expected = derived.sign_canonical(&digest, classify(signature))?;
			if expected != *signature {
				return Err(ConvertError::ChainIdentityMismatch);
			}
		}
		Ok(())
	}
}

fn progress_percent(done: u64, total: u64) -> u64 {
	if total == 0 {
		return 100;
	}
	done.saturating_mul(100) / total
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn progress_is_a_whole_percentage() {
		assert_eq!(progress_percent(0, 200), 0);
		assert_eq!(progress_percent(1, 200), 0);
		assert_eq!(progress_percent(50, 200), 25);
		assert_eq!(progress_percent(200, 200), 100);
		assert_eq!(progress_percent(0, 0), 100);
	}
}
