use chainport_types::BlockRef;

/// Default number of source blocks between destination-head queries.
/// Refreshing on a cadence bounds the cost of polling a remote
/// destination without letting the reference grow stale.
pub const DEFAULT_TAPOS_REFRESH_INTERVAL: u64 = 50;

/// How far past the destination head time a re-stamped transaction
/// stays fresh.
const EXPIRATION_WINDOW_SECS: u64 = 3600;

/// The destination chain's most recently observed head, with the head
/// time when the destination can report one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestinationHead {
	pub block: BlockRef,
	pub time: Option<u64>,
}

/// Tracks the recent-block reference re-signed transactions must carry
/// so they remain valid on the destination chain.
#[derive(Debug)]
pub struct TaposTracker {
	refresh_interval: u64,
	current: Option<DestinationHead>,
	last_refresh_at: Option<u64>,
}

impl TaposTracker {
	pub fn new(refresh_interval: u64) -> Self {
		Self { refresh_interval: refresh_interval.max(1), current: None, last_refresh_at: None }
	}

	/// Whether the reference should be refreshed before converting the
	/// block at this source height.
	pub fn needs_refresh(&self, source_height: u64) -> bool {
		match self.last_refresh_at {
			None => true,
			Some(at) => source_height >= at + self.refresh_interval,
		}
	}

	pub fn refresh(&mut self, source_height: u64, head: DestinationHead) {
		self.current = Some(head);
		self.last_refresh_at = Some(source_height);
	}

	pub fn reference(&self) -> Option<&DestinationHead> {
		self.current.as_ref()
	}

	/// Expiration stamp for re-signed transactions, when the
	/// destination reports a head time.
	pub fn expiration(&self) -> Option<u64> {
		self.current.as_ref()?.time.map(|t| t + EXPIRATION_WINDOW_SECS)
	}
}

/// Hardfork-activation bookkeeping across source and destination block
/// numbering. Activation heights are defined on the source chain; the
/// tracker maintains the numbering offset observed from touched
/// destination blocks so the same activations gate correctly in the
/// destination's numbering.
#[derive(Debug)]
pub struct HardforkTracker {
	activations: Vec<u64>,
	dest_offset: i64,
	touched_head: u64,
}

impl HardforkTracker {
	pub fn new(mut activations: Vec<u64>) -> Self {
		activations.sort_unstable();
		Self { activations, dest_offset: 0, touched_head: 0 }
	}

	/// Records that the source block at `source_height` corresponds to
	/// the destination block at `dest_height`.
	pub fn touch(&mut self, source_height: u64, dest_height: u64) {
		self.dest_offset = dest_height as i64 - source_height as i64;
		self.touched_head = self.touched_head.max(dest_height);
	}

	/// Records a new destination head observed through a TaPoS refresh.
	pub fn on_tapos_change(&mut self, head: &DestinationHead) {
		self.touched_head = self.touched_head.max(head.block.num);
	}

	pub fn is_active(&self, activation_index: usize, source_height: u64) -> bool {
		self.activations.get(activation_index).is_some_and(|&height| source_height >= height)
	}

	/// The activation height translated into destination numbering.
	pub fn dest_activation_height(&self, activation_index: usize) -> Option<u64> {
		let height = *self.activations.get(activation_index)? as i64 + self.dest_offset;
		Some(height.max(0) as u64)
	}

	pub fn numbering_offset(&self) -> i64 {
		self.dest_offset
	}

	pub fn touched_head(&self) -> u64 {
		self.touched_head
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chainport_types::block::BlockId;
	use chainport_types::Hash256;

	fn head(num: u64, time: Option<u64>) -> DestinationHead {
		let id = BlockId::new(num, Hash256([4u8; 32]));
		DestinationHead { block: id.block_ref(), time }
	}

	#[test]
	fn refresh_cadence() {
		let mut tapos = TaposTracker::new(10);
		assert!(tapos.needs_refresh(1));
		tapos.refresh(1, head(5, None));
		assert!(!tapos.needs_refresh(5));
		assert!(!tapos.needs_refresh(10));
		assert!(tapos.needs_refresh(11));
		assert_eq!(tapos.reference().map(|h| h.block.num), Some(5));
	}

	#[test]
	fn expiration_requires_a_head_time() {
		let mut tapos = TaposTracker::new(10);
		assert_eq!(tapos.expiration(), None);
		tapos.refresh(1, head(5, None));
		assert_eq!(tapos.expiration(), None);
		tapos.refresh(2, head(6, Some(100)));
		assert_eq!(tapos.expiration(), Some(100 + EXPIRATION_WINDOW_SECS));
	}

	#[test]
	fn activations_translate_into_destination_numbering() {
		let mut hardforks = HardforkTracker::new(vec![100, 500]);
		assert!(!hardforks.is_active(0, 99));
		assert!(hardforks.is_active(0, 100));
		assert!(!hardforks.is_active(2, u64::MAX));

		// destination runs 40 blocks behind the source
		hardforks.touch(50, 10);
		assert_eq!(hardforks.numbering_offset(), -40);
		assert_eq!(hardforks.dest_activation_height(0), Some(60));
		assert_eq!(hardforks.dest_activation_height(1), Some(460));

		hardforks.on_tapos_change(&head(30, None));
		assert_eq!(hardforks.touched_head(), 30);
	}
}
