use crate::registry::KeyRegistry;
use crate::ConvertError;
use chainport_signing::PrivateKey;
use chainport_types::authority::Authority;
use chainport_types::crypto::PublicKey;
use chainport_types::operation::{
	Operation, WitnessSetPropertiesOperation, SIGNING_KEY_PROP,
};

/// Witness property keys holding embedded public key blobs.
const KEY_PROPS: [&str; 2] = [SIGNING_KEY_PROP, "key"];

/// Administrator keypairs optionally injected into account authorities
/// during early blocks, so the migrated chain stays administratively
/// controllable. Injection is an explicit phase bounded by a cutoff
/// height on the source chain's numbering.
#[derive(Debug, Default)]
pub struct SecondAuthorityKeySet {
	pub owner: Option<PrivateKey>,
	pub active: Option<PrivateKey>,
	pub posting: Option<PrivateKey>,
	cutoff_height: u64,
}

impl SecondAuthorityKeySet {
	pub fn new(
		owner: Option<PrivateKey>,
		active: Option<PrivateKey>,
		posting: Option<PrivateKey>,
		cutoff_height: u64,
	) -> Self {
		Self { owner, active, posting, cutoff_height }
	}

	pub fn is_empty(&self) -> bool {
		self.owner.is_none() && self.active.is_none() && self.posting.is_none()
	}

	pub fn cutoff_height(&self) -> u64 {
		self.cutoff_height
	}

	/// Whether authorities rewritten at this source height receive the
	/// administrator keys.
	pub fn active_at(&self, source_height: u64) -> bool {
		!self.is_empty() && source_height < self.cutoff_height
	}
}

/// Substitutes every key-weight pair of an authority through the
/// registry. Weights, the threshold, and account-name entries are left
/// untouched, so which signature combinations satisfy the authority is
/// preserved; only the concrete keys change.
pub fn rewrite_authority(authority: &Authority, registry: &mut KeyRegistry) -> Authority {
	let mut rewritten = Authority::new(authority.weight_threshold);
	rewritten.account_auths = authority.account_auths.clone();
	for (key, weight) in &authority.key_auths {
		rewritten.add_key(registry.get_public(key), *weight);
	}
	rewritten
}

/// Adds an administrator key able to satisfy the authority on its own.
fn inject_admin(authority: &mut Authority, admin: Option<&PrivateKey>) {
	if let Some(admin) = admin {
		let weight = authority.weight_threshold.min(u32::from(u16::MAX)) as u16;
		authority.add_key(admin.public(), weight);
	}
}

fn rewrite_props(
	op: &WitnessSetPropertiesOperation,
	registry: &mut KeyRegistry,
) -> Result<WitnessSetPropertiesOperation, ConvertError> {
	let mut rewritten = op.clone();
	for prop in KEY_PROPS {
		if let Some(blob) = rewritten.props.get_mut(prop) {
			let key: PublicKey =
				bcs::from_bytes(blob).map_err(ConvertError::MalformedOperation)?;
			let substituted = registry.get_public(&key);
			*blob = bcs::to_bytes(&substituted)
				.map_err(|e| ConvertError::Codec(chainport_types::CodecError::Serialize(e)))?;
		}
	}
	Ok(rewritten)
}

/// Rewrites every weighted-threshold authority embedded in the
/// operation. Variants without embedded key material pass through
/// unchanged. When `second` is set, the administrator keys are injected
/// into the rewritten account authorities as well.
pub fn rewrite_operation(
	operation: &Operation,
	registry: &mut KeyRegistry,
	second: Option<&SecondAuthorityKeySet>,
) -> Result<Operation, ConvertError> {
	let rewritten = match operation {
		Operation::AccountCreate(op) => {
			let mut op = op.clone();
			op.owner = rewrite_authority(&op.owner, registry);
			op.active = rewrite_authority(&op.active, registry);
			op.posting = rewrite_authority(&op.posting, registry);
			op.memo_key = registry.get_public(&op.memo_key);
			if let Some(second) = second {
				inject_admin(&mut op.owner, second.owner.as_ref());
				inject_admin(&mut op.active, second.active.as_ref());
				inject_admin(&mut op.posting, second.posting.as_ref());
			}
			Operation::AccountCreate(op)
		}
		Operation::AccountUpdate(op) => {
			let mut op = op.clone();
			op.owner = op.owner.as_ref().map(|a| rewrite_authority(a, registry));
			op.active = op.active.as_ref().map(|a| rewrite_authority(a, registry));
			op.posting = op.posting.as_ref().map(|a| rewrite_authority(a, registry));
			op.memo_key = op.memo_key.as_ref().map(|k| registry.get_public(k));
			if let Some(second) = second {
				if let Some(owner) = op.owner.as_mut() {
					inject_admin(owner, second.owner.as_ref());
				}
				if let Some(active) = op.active.as_mut() {
					inject_admin(active, second.active.as_ref());
				}
				if let Some(posting) = op.posting.as_mut() {
					inject_admin(posting, second.posting.as_ref());
				}
			}
			Operation::AccountUpdate(op)
		}
		Operation::RequestAccountRecovery(op) => {
			let mut op = op.clone();
			op.new_owner_authority = rewrite_authority(&op.new_owner_authority, registry);
			if let Some(second) = second {
				inject_admin(&mut op.new_owner_authority, second.owner.as_ref());
			}
			Operation::RequestAccountRecovery(op)
		}
		Operation::RecoverAccount(op) => {
			let mut op = op.clone();
			op.new_owner_authority = rewrite_authority(&op.new_owner_authority, registry);
			op.recent_owner_authority = rewrite_authority(&op.recent_owner_authority, registry);
			if let Some(second) = second {
				inject_admin(&mut op.new_owner_authority, second.owner.as_ref());
				inject_admin(&mut op.recent_owner_authority, second.owner.as_ref());
			}
			Operation::RecoverAccount(op)
		}
		Operation::WitnessUpdate(op) => {
			let mut op = op.clone();
			op.block_signing_key = registry.get_public(&op.block_signing_key);
			Operation::WitnessUpdate(op)
		}
		Operation::WitnessSetProperties(op) => {
			Operation::WitnessSetProperties(rewrite_props(op, registry)?)
		}
		Operation::CustomMultiSig(op) => {
			let mut op = op.clone();
			op.auths = op.auths.iter().map(|a| rewrite_authority(a, registry)).collect();
			Operation::CustomMultiSig(op)
		}
		// no embedded key material
		Operation::Transfer(_) | Operation::Custom(_) => operation.clone(),
	};
	Ok(rewritten)
}
