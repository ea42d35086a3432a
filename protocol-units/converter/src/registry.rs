use chainport_signing::{MasterSecret, PrivateKey};
use chainport_types::crypto::PublicKey;
use std::collections::HashMap;

/// A lazily created substitution entry for one original public key.
#[derive(Debug)]
pub struct DerivedKeyEntry {
	pub original: PublicKey,
	pub derived: PrivateKey,
}

/// Insertion-ordered mapping from original public keys to derived
/// keypairs. The Nth distinct key ever requested derives from the
/// master secret and the index N, so within one run the mapping is a
/// pure function of first-request order.
///
/// Known limitation: the index is the count of distinct keys seen so
/// far in this process. Resuming a conversion without replaying the
/// full original request order can assign a different index (and
/// therefore a different substitute key) to a key first seen after the
/// resume point than an unbroken run would have.
#[derive(Debug)]
pub struct KeyRegistry {
	secret: MasterSecret,
	entries: Vec<DerivedKeyEntry>,
	index: HashMap<PublicKey, usize>,
}

impl KeyRegistry {
	pub fn new(secret: MasterSecret) -> Self {
		Self { secret, entries: Vec::new(), index: HashMap::new() }
	}

	/// The derived private key substituting for the given original key,
	/// created at most once per distinct original.
	pub fn get_private(&mut self, original: &PublicKey) -> &PrivateKey {
		let index = match self.index.get(original) {
			Some(&index) => index,
			None => {
				let index = self.entries.len();
				let derived = self.secret.derive(index);
				self.entries.push(DerivedKeyEntry { original: *original, derived });
				self.index.insert(*original, index);
				index
			}
		};
		&self.entries[index].derived
	}

	/// The public half of [KeyRegistry::get_private].
	pub fn get_public(&mut self, original: &PublicKey) -> PublicKey {
		self.get_private(original).public()
	}

	/// Finds the substitute private key whose public half matches,
	/// checking registered entries first and then fresh derivation
	/// indices up to `limit`. The search registers nothing.
	pub fn match_derived(&self, public: &PublicKey, limit: usize) -> Option<PrivateKey> {
		for entry in &self.entries {
			if entry.derived.public() == *public {
				return Some(entry.derived.clone());
			}
		}
		(self.entries.len()..limit)
			.map(|index| self.secret.derive(index))
			.find(|key| key.public() == *public)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn entries(&self) -> impl Iterator<Item = &DerivedKeyEntry> {
		self.entries.iter()
	}
}
