pub mod authority;
pub mod block;
pub mod crypto;
pub mod operation;
pub mod transaction;

use sha2::Digest as _;
use std::fmt;

/// Errors that occur when parsing chain material from byte sequences.
#[derive(Debug, thiserror::Error)]
#[error("invalid chain material: {0}")]
pub struct MaterialError(pub String);

/// Errors that occur when computing canonical bytes for signing.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	#[error("failed to serialize canonical bytes")]
	Serialize(#[source] bcs::Error),
	#[error("failed to deserialize canonical bytes")]
	Deserialize(#[source] bcs::Error),
}

/// Declares a fixed-size byte newtype with hex display and a serde
/// representation that is a hex string in human-readable formats and a
/// raw byte string otherwise.
macro_rules! fixed_bytes {
	($(#[$meta:meta])* pub struct $Name:ident([u8; $len:expr])) => {
		$(#[$meta])*
		#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
		pub struct $Name(pub [u8; Self::BYTES_LEN]);

		impl $Name {
			pub const BYTES_LEN: usize = $len;

			pub fn as_bytes(&self) -> &[u8; Self::BYTES_LEN] {
				&self.0
			}

			pub fn to_vec(&self) -> Vec<u8> {
				self.0.into()
			}

			pub fn from_hex(hex_str: &str) -> Result<Self, $crate::MaterialError> {
				let bytes = hex::decode(hex_str).map_err(|e| {
					$crate::MaterialError(format!("invalid hex string: {}", e))
				})?;
				Self::try_from(bytes.as_slice())
			}
		}

		impl Default for $Name {
			fn default() -> Self {
				Self([0u8; Self::BYTES_LEN])
			}
		}

		impl AsRef<[u8]> for $Name {
			fn as_ref(&self) -> &[u8] {
				&self.0
			}
		}

		impl TryFrom<&[u8]> for $Name {
			type Error = $crate::MaterialError;

			fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
				if bytes.len() != Self::BYTES_LEN {
					return Err($crate::MaterialError(format!(
						"expected {} bytes, got {}",
						Self::BYTES_LEN,
						bytes.len()
					)));
				}
				let mut inner = [0u8; Self::BYTES_LEN];
				inner.copy_from_slice(bytes);
				Ok(Self(inner))
			}
		}

		impl std::fmt::Display for $Name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				for byte in &self.0 {
					write!(f, "{:02x}", byte)?;
				}
				Ok(())
			}
		}

		impl std::fmt::Debug for $Name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(f, concat!(stringify!($Name), "({})"), self)
			}
		}

		impl serde::Serialize for $Name {
			fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
			where
				S: serde::Serializer,
			{
				if serializer.is_human_readable() {
					serializer.serialize_str(&hex::encode(self.0))
				} else {
					serializer.serialize_bytes(&self.0)
				}
			}
		}

		impl<'de> serde::Deserialize<'de> for $Name {
			fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
			where
				D: serde::Deserializer<'de>,
			{
				struct BytesVisitor;

				impl<'de> serde::de::Visitor<'de> for BytesVisitor {
					type Value = $Name;

					fn expecting(
						&self,
						formatter: &mut std::fmt::Formatter,
					) -> std::fmt::Result {
						write!(formatter, "{} bytes", $Name::BYTES_LEN)
					}

					fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
					where
						E: serde::de::Error,
					{
						$Name::try_from(v).map_err(serde::de::Error::custom)
					}

					fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
					where
						E: serde::de::Error,
					{
						$Name::from_hex(v).map_err(serde::de::Error::custom)
					}
				}

				if deserializer.is_human_readable() {
					deserializer.deserialize_str(BytesVisitor)
				} else {
					deserializer.deserialize_bytes(BytesVisitor)
				}
			}
		}
	};
}

pub(crate) use fixed_bytes;

fixed_bytes!(
	/// Identity of a chain, mixed into every signing digest. A signature
	/// valid under one chain id does not verify under another.
	pub struct ChainId([u8; 32])
);

fixed_bytes!(
	/// A sha256 content hash.
	pub struct Hash256([u8; 32])
);

impl Hash256 {
	/// Digests the concatenation of the given byte slices.
	pub fn digest(parts: &[&[u8]]) -> Self {
		let mut hasher = sha2::Sha256::new();
		for part in parts {
			hasher.update(part);
		}
		Self(hasher.finalize().into())
	}
}

/// Account names are plain strings on the wire.
pub type AccountName = String;

/// A reference to a block by height and id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockRef {
	pub num: u64,
	pub id: block::BlockId,
}

impl fmt::Display for BlockRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{} ({})", self.num, self.id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chain_id_hex_round_trip() -> Result<(), anyhow::Error> {
		let id = ChainId::from_hex(
			"18dcf0a285365fc58b71f18b3d3fec954aa0c141c44e4e5cb4cf777b9eab274e",
		)?;
		assert_eq!(ChainId::from_hex(&id.to_string())?, id);
		Ok(())
	}

	#[test]
	fn hash_digest_concatenation_is_order_sensitive() {
		let a = Hash256::digest(&[b"ab", b"c"]);
		let b = Hash256::digest(&[b"a", b"bc"]);
		let c = Hash256::digest(&[b"c", b"ab"]);
		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn human_readable_serde_uses_hex_strings() -> Result<(), anyhow::Error> {
		let hash = Hash256::digest(&[b"x"]);
		let json = serde_json::to_string(&hash)?;
		assert_eq!(json, format!("\"{}\"", hash));
		assert_eq!(serde_json::from_str::<Hash256>(&json)?, hash);
		Ok(())
	}

	#[test]
	fn binary_serde_uses_raw_bytes() -> Result<(), anyhow::Error> {
		let hash = Hash256::digest(&[b"x"]);
		let bytes = bcs::to_bytes(&hash)?;
		// one length byte plus the 32 raw bytes
		assert_eq!(bytes.len(), 33);
		assert_eq!(bcs::from_bytes::<Hash256>(&bytes)?, hash);
		Ok(())
	}
}
