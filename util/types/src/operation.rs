use crate::authority::Authority;
use crate::crypto::PublicKey;
use crate::AccountName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property key under which a witness publishes a rotated signing key.
/// The value is the bcs encoding of a [PublicKey].
pub const SIGNING_KEY_PROP: &str = "new_signing_key";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransferOperation {
	pub from: AccountName,
	pub to: AccountName,
	pub amount: u64,
	pub memo: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountCreateOperation {
	pub creator: AccountName,
	pub new_account_name: AccountName,
	pub owner: Authority,
	pub active: Authority,
	pub posting: Authority,
	pub memo_key: PublicKey,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountUpdateOperation {
	pub account: AccountName,
	pub owner: Option<Authority>,
	pub active: Option<Authority>,
	pub posting: Option<Authority>,
	pub memo_key: Option<PublicKey>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RequestAccountRecoveryOperation {
	pub recovery_account: AccountName,
	pub account_to_recover: AccountName,
	pub new_owner_authority: Authority,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecoverAccountOperation {
	pub account_to_recover: AccountName,
	pub new_owner_authority: Authority,
	pub recent_owner_authority: Authority,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WitnessUpdateOperation {
	pub owner: AccountName,
	pub url: String,
	pub block_signing_key: PublicKey,
}

/// Witness key rotation via a typed property map. Key material is
/// embedded as opaque bcs blobs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WitnessSetPropertiesOperation {
	pub owner: AccountName,
	pub props: BTreeMap<String, Vec<u8>>,
}

/// A custom operation gated on explicit weighted-threshold authorities
/// rather than on named accounts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CustomMultiSigOperation {
	pub required_auths: Vec<AccountName>,
	pub auths: Vec<Authority>,
	pub id: u16,
	pub data: Vec<u8>,
}

/// Opaque application payload with no embedded key material.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CustomOperation {
	pub required_auths: Vec<AccountName>,
	pub id: u16,
	pub data: Vec<u8>,
}

/// The closed set of ledger operations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
	Transfer(TransferOperation),
	AccountCreate(AccountCreateOperation),
	AccountUpdate(AccountUpdateOperation),
	RequestAccountRecovery(RequestAccountRecoveryOperation),
	RecoverAccount(RecoverAccountOperation),
	WitnessUpdate(WitnessUpdateOperation),
	WitnessSetProperties(WitnessSetPropertiesOperation),
	CustomMultiSig(CustomMultiSigOperation),
	Custom(CustomOperation),
}

impl Operation {
	/// Accounts whose owner authority must sign this operation.
	pub fn required_owner_authorities(&self) -> Vec<&AccountName> {
		match self {
			Operation::AccountUpdate(op) if op.owner.is_some() => vec![&op.account],
			_ => vec![],
		}
	}

	/// Accounts whose active authority must sign this operation.
	pub fn required_active_authorities(&self) -> Vec<&AccountName> {
		match self {
			Operation::Transfer(op) => vec![&op.from],
			Operation::AccountCreate(op) => vec![&op.creator],
			Operation::AccountUpdate(op) if op.owner.is_none() => vec![&op.account],
			Operation::RequestAccountRecovery(op) => vec![&op.recovery_account],
			Operation::WitnessUpdate(op) => vec![&op.owner],
			Operation::WitnessSetProperties(op) => vec![&op.owner],
			Operation::Custom(op) => op.required_auths.iter().collect(),
			_ => vec![],
		}
	}

	/// Accounts whose posting authority must sign this operation.
	pub fn required_posting_authorities(&self) -> Vec<&AccountName> {
		vec![]
	}

	/// Explicit signer authorities carried inside the operation itself.
	pub fn required_authorities(&self) -> Vec<&Authority> {
		match self {
			Operation::RecoverAccount(op) => {
				vec![&op.new_owner_authority, &op.recent_owner_authority]
			}
			Operation::CustomMultiSig(op) => op.auths.iter().collect(),
			_ => vec![],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn account_update_requires_owner_only_when_owner_changes() {
		let mut op = AccountUpdateOperation {
			account: "alice".into(),
			owner: None,
			active: None,
			posting: None,
			memo_key: None,
		};
		assert!(Operation::AccountUpdate(op.clone()).required_owner_authorities().is_empty());
		assert_eq!(
			Operation::AccountUpdate(op.clone()).required_active_authorities(),
			vec![&"alice".to_string()]
		);

		op.owner = Some(Authority::new(1));
		let with_owner = Operation::AccountUpdate(op);
		assert_eq!(with_owner.required_owner_authorities(), vec![&"alice".to_string()]);
		assert!(with_owner.required_active_authorities().is_empty());
	}

	#[test]
	fn recover_account_lists_both_authorities() {
		let op = Operation::RecoverAccount(RecoverAccountOperation {
			account_to_recover: "alice".into(),
			new_owner_authority: Authority::new(1),
			recent_owner_authority: Authority::new(2),
		});
		assert_eq!(op.required_authorities().len(), 2);
	}
}
