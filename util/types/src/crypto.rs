use crate::fixed_bytes;

fixed_bytes!(
	/// A compressed SEC1 secp256k1 public key.
	pub struct PublicKey([u8; 33])
);

fixed_bytes!(
	/// A recoverable compact ECDSA signature: one recovery byte followed
	/// by the 32-byte `r` and 32-byte `s` scalars.
	pub struct Signature([u8; 65])
);

impl Signature {
	pub fn recovery_byte(&self) -> u8 {
		self.0[0]
	}

	pub fn r_bytes(&self) -> &[u8] {
		&self.0[1..33]
	}

	pub fn s_bytes(&self) -> &[u8] {
		&self.0[33..65]
	}

	pub fn from_parts(recovery_byte: u8, compact: &[u8; 64]) -> Self {
		let mut inner = [0u8; Self::BYTES_LEN];
		inner[0] = recovery_byte;
		inner[1..].copy_from_slice(compact);
		Self(inner)
	}
}
