use chainport_types::crypto::Signature;

/// Half the secp256k1 group order, big-endian. An `s` scalar at or
/// below this bound is "low" in the BIP-0062 sense.
const HALF_ORDER: [u8; 32] = [
	0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
	0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
	0x20, 0xa0,
];

/// The canonical encodings a compact signature may use. The form also
/// determines how downstream validators recover the signing key, so a
/// replacement signature must reproduce the form of the original.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanonicalForm {
	/// Both `r` and `s` have a clear high bit and no superfluous
	/// leading zero byte. The strictest of the historical forms.
	Legacy,
	/// `s` is in the lower half of the group order (BIP-0062 style).
	LowS,
	/// Neither of the above.
	NonCanonical,
}

fn scalar_high_bit_clear(scalar: &[u8]) -> bool {
	scalar[0] & 0x80 == 0 && !(scalar[0] == 0 && scalar[1] & 0x80 == 0)
}

fn is_legacy(signature: &Signature) -> bool {
	scalar_high_bit_clear(signature.r_bytes()) && scalar_high_bit_clear(signature.s_bytes())
}

fn is_low_s(signature: &Signature) -> bool {
	signature.s_bytes() <= &HALF_ORDER[..]
}

/// Classifies a signature, trying the strictest form first.
pub fn classify(signature: &Signature) -> CanonicalForm {
	if is_legacy(signature) {
		CanonicalForm::Legacy
	} else if is_low_s(signature) {
		CanonicalForm::LowS
	} else {
		CanonicalForm::NonCanonical
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sig(r0: u8, r1: u8, s0: u8, s1: u8) -> Signature {
		let mut compact = [0x55u8; 64];
		compact[0] = r0;
		compact[1] = r1;
		compact[32] = s0;
		compact[33] = s1;
		Signature::from_parts(0, &compact)
	}

	#[test]
	fn clear_high_bits_classify_as_legacy() {
		assert_eq!(classify(&sig(0x12, 0x55, 0x34, 0x55)), CanonicalForm::Legacy);
	}

	#[test]
	fn high_r_with_low_s_classifies_as_low_s() {
		assert_eq!(classify(&sig(0x92, 0x55, 0x34, 0x55)), CanonicalForm::LowS);
	}

	#[test]
	fn padded_r_is_not_legacy() {
		// leading zero byte followed by a clear high bit is superfluous padding
		assert_eq!(classify(&sig(0x00, 0x55, 0x34, 0x55)), CanonicalForm::LowS);
	}

	#[test]
	fn high_s_is_non_canonical() {
		assert_eq!(classify(&sig(0x92, 0x55, 0xf4, 0x55)), CanonicalForm::NonCanonical);
	}

	#[test]
	fn half_order_boundary() {
		let mut compact = [0u8; 64];
		compact[0] = 0x92; // keep r out of legacy range
		compact[32..].copy_from_slice(&HALF_ORDER);
		assert_eq!(classify(&Signature::from_parts(0, &compact)), CanonicalForm::LowS);

		// one above the bound is high
		compact[63] += 1;
		assert_eq!(classify(&Signature::from_parts(0, &compact)), CanonicalForm::NonCanonical);
	}
}
