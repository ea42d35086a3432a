use crate::crypto::PublicKey;
use crate::AccountName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A weighted-threshold authority: satisfied when the weights of the
/// keys and accounts that actually signed sum to at least the threshold.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Authority {
	pub weight_threshold: u32,
	pub account_auths: BTreeMap<AccountName, u16>,
	pub key_auths: BTreeMap<PublicKey, u16>,
}

impl Authority {
	pub fn new(weight_threshold: u32) -> Self {
		Self { weight_threshold, account_auths: BTreeMap::new(), key_auths: BTreeMap::new() }
	}

	/// A single-key authority with threshold 1.
	pub fn single_key(key: PublicKey) -> Self {
		let mut authority = Self::new(1);
		authority.add_key(key, 1);
		authority
	}

	pub fn add_key(&mut self, key: PublicKey, weight: u16) {
		self.key_auths.insert(key, weight);
	}

	pub fn add_account(&mut self, account: AccountName, weight: u16) {
		self.account_auths.insert(account, weight);
	}

	pub fn key_weight(&self, key: &PublicKey) -> Option<u16> {
		self.key_auths.get(key).copied()
	}

	pub fn num_entries(&self) -> usize {
		self.account_auths.len() + self.key_auths.len()
	}

	/// Whether the given set of signing keys meets the weight threshold.
	/// Account-based entries are not resolvable without chain state and
	/// contribute nothing here.
	pub fn is_satisfied_by(&self, signers: &BTreeSet<PublicKey>) -> bool {
		let mut total: u64 = 0;
		for (key, weight) in &self.key_auths {
			if signers.contains(key) {
				total += u64::from(*weight);
				if total >= u64::from(self.weight_threshold) {
					return true;
				}
			}
		}
		total >= u64::from(self.weight_threshold)
	}

	/// The multiset of key weights, in map order. Key substitution must
	/// leave this sequence intact.
	pub fn key_weights(&self) -> Vec<u16> {
		self.key_auths.values().copied().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn key(tag: u8) -> PublicKey {
		let mut bytes = [2u8; 33];
		bytes[32] = tag;
		PublicKey(bytes)
	}

	#[test]
	fn threshold_satisfaction() {
		let mut authority = Authority::new(3);
		authority.add_key(key(1), 2);
		authority.add_key(key(2), 2);
		authority.add_account("steward".into(), 1);

		let mut signers = BTreeSet::new();
		signers.insert(key(1));
		assert!(!authority.is_satisfied_by(&signers));

		signers.insert(key(2));
		assert!(authority.is_satisfied_by(&signers));
	}

	#[test]
	fn unknown_signers_do_not_count() {
		let mut authority = Authority::new(1);
		authority.add_key(key(1), 1);

		let mut signers = BTreeSet::new();
		signers.insert(key(9));
		assert!(!authority.is_satisfied_by(&signers));
	}
}
