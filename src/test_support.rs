//! Shared fixtures for unit tests: a real (if modest, 1024-bit) RSA keypair
//! so signature tests exercise genuine modular exponentiation instead of a
//! modulus too small to ever hold a SHA-512 digest.
#![cfg(test)]

use num_bigint::BigUint;
use sha2::{Digest, Sha512};

use crate::base64;
use crate::verify::PublicKey;

const N_DEC: &str = "165649837088360520999750444742592843303881462301710780436803715864614419868345712417218297163018513165349358333923803080111685824576105762468622985364949421699661902733865637128004040315523468820076073248415300693111027636553773262985259441279626520583477662606322156919297235467402707684412645513352916444163";
const E_DEC: &str = "65537";
const D_DEC: &str = "151199677352117526987885798930404258456111647998662417958246460518809750164402406530631529308509200261702528579814790122408426477045678726686803286456982664237946885522439931440870692181839172005776338374400825042209402848570194118430806202550695938304826802339905997851942051142956654980124359018449645668673";

pub fn public_key() -> PublicKey {
    PublicKey {
        exponent: E_DEC.parse().unwrap(),
        modulus: N_DEC.parse().unwrap(),
    }
}

fn private_exponent() -> BigUint {
    D_DEC.parse().unwrap()
}

fn modulus() -> BigUint {
    N_DEC.parse().unwrap()
}

/// Produces the 512-byte, base64-encoded raw-RSA signature over `message`
/// that a correctly-keyed manifest would carry.
pub fn sign(message: &[u8]) -> String {
    let digest = Sha512::digest(message);
    let h = BigUint::from_bytes_be(&digest);
    let s = h.modpow(&private_exponent(), &modulus());
    let mut bytes = s.to_bytes_be();
    assert!(bytes.len() <= 512);
    let mut padded = vec![0u8; 512 - bytes.len()];
    padded.append(&mut bytes);
    base64::encode(&padded)
}

pub fn public_key_wire_b64() -> String {
    fn encode_component(value: &BigUint) -> Vec<u8> {
        let bytes = value.to_bytes_be();
        let bit_len = (bytes.len() * 8) as u16;
        let mut out = bit_len.to_be_bytes().to_vec();
        out.extend_from_slice(&bytes);
        out
    }

    let key = public_key();
    let mut wire = encode_component(&key.exponent);
    wire.extend(encode_component(&key.modulus));
    base64::encode(&wire)
}
