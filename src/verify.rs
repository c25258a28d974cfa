//! Streaming SHA-512 + raw RSA signature verification.
//!
//! This is textbook unpadded RSA ("raw RSA", no PKCS#1 formatting). The `rsa`
//! crate's public API only exposes PKCS#1v1.5/PSS-padded verification, so the
//! modular exponentiation here is done directly with `num_bigint::BigUint`.
//! The signature bytes on the wire will not match a padding-aware scheme —
//! do not "upgrade" this to PKCS#1/PSS, compatibility would break.

use num_bigint::BigUint;
use sha2::{Digest, Sha512};

use crate::base64;
use crate::error::{Result, UpdaterError};

const DIGEST_LEN: usize = 64;
const SIGNATURE_LEN: usize = 512;

/// An RSA public key as a bare `(exponent, modulus)` pair, with no ASN.1
/// framing beyond the custom length-prefixed encoding this type parses.
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub exponent: BigUint,
    pub modulus: BigUint,
}

impl PublicKey {
    /// Parses the embedded-key wire format: two components, each a
    /// `[2-byte big-endian bit-length][component bytes]` record, read in
    /// the order exponent-then-modulus.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::decode(encoded.as_bytes());
        let mut pos = 0;
        let mut components = Vec::with_capacity(2);

        for _ in 0..2 {
            if bytes.len() < pos + 2 {
                return Err(UpdaterError::InvalidPublicKey(
                    "truncated component length".into(),
                ));
            }
            let bit_len = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as usize;
            let byte_len = (bit_len + 7) / 8;
            pos += 2;

            if bytes.len() < pos + byte_len {
                return Err(UpdaterError::InvalidPublicKey(
                    "truncated component body".into(),
                ));
            }
            components.push(BigUint::from_bytes_be(&bytes[pos..pos + byte_len]));
            pos += byte_len;
        }

        let exponent = components.remove(0);
        let modulus = components.remove(0);
        Ok(PublicKey { exponent, modulus })
    }
}

/// Accumulates a SHA-512 digest over a sequence of byte slices and checks it
/// against a raw-RSA signature at the end.
pub struct SignatureVerifier<'a> {
    key: &'a PublicKey,
    hasher: Sha512,
}

impl<'a> SignatureVerifier<'a> {
    pub fn new(key: &'a PublicKey) -> Self {
        SignatureVerifier { key, hasher: Sha512::new() }
    }

    /// Discards any accumulated state and begins a fresh digest.
    pub fn init(&mut self) {
        self.hasher = Sha512::new();
    }

    pub fn add(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Finalizes the digest and checks it against `signature_b64`.
    pub fn verify(self, signature_b64: &str) -> bool {
        let signature = base64::decode(signature_b64.as_bytes());
        if signature.len() != SIGNATURE_LEN {
            return false;
        }

        let digest = self.hasher.finalize();

        let s = BigUint::from_bytes_be(&signature);
        let m = s.modpow(&self.key.exponent, &self.key.modulus);

        // `BigUint::to_bytes_be` always returns at least one byte (`[0]`)
        // for a zero value; the wire format instead wants a true zero-length
        // serialization in that case, so we special-case it rather than rely
        // on `to_bytes_be`'s padding behavior.
        let mut serialized = if m == BigUint::from(0u32) { Vec::new() } else { m.to_bytes_be() };

        if serialized.is_empty() {
            return false;
        }
        if serialized.len() > DIGEST_LEN {
            return false;
        }
        if serialized.len() < DIGEST_LEN {
            let mut padded = vec![0u8; DIGEST_LEN - serialized.len()];
            padded.append(&mut serialized);
            serialized = padded;
        }

        serialized == digest.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn public_key_roundtrips_through_wire_framing() {
        let key = test_support::public_key();
        let encoded = test_support::public_key_wire_b64();

        let parsed = PublicKey::from_base64(&encoded).unwrap();
        assert_eq!(parsed.exponent, key.exponent);
        assert_eq!(parsed.modulus, key.modulus);
    }

    #[test]
    fn rejects_truncated_key_material() {
        let encoded = base64::encode(&[0, 8]); // claims 8 bits, supplies 0
        assert!(PublicKey::from_base64(&encoded).is_err());
    }

    #[test]
    fn accepts_a_correctly_signed_message() {
        let key = test_support::public_key();
        let mut verifier = SignatureVerifier::new(&key);
        verifier.add(b"hello ");
        verifier.add(b"world");
        let sig = test_support::sign(b"hello world");
        assert!(verifier.verify(&sig));
    }

    #[test]
    fn rejects_a_signature_over_different_bytes() {
        let key = test_support::public_key();
        let mut verifier = SignatureVerifier::new(&key);
        verifier.add(b"hello world");
        let sig = test_support::sign(b"goodbye world");
        assert!(!verifier.verify(&sig));
    }

    #[test]
    fn wrong_length_signature_is_rejected() {
        let key = test_support::public_key();
        let verifier = SignatureVerifier::new(&key);
        let short_sig = base64::encode(&[1u8; 10]);
        assert!(!verifier.verify(&short_sig));
    }

    #[test]
    fn all_zero_signature_is_rejected() {
        let key = test_support::public_key();
        let verifier = SignatureVerifier::new(&key);
        let sig = base64::encode(&[0u8; 512]);
        assert!(!verifier.verify(&sig));
    }
}
