//! Shared fixtures for the end-to-end transaction tests: a real RSA keypair
//! (distinct copy of the one under `src/test_support.rs` -- integration
//! tests compile against the public API only, so the crate's `#[cfg(test)]`
//! fixture module isn't visible here) and a minimal single-threaded HTTP
//! stub server for the manifest/file fetches.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;

use num_bigint::BigUint;
use sha2::{Digest, Sha512};

use megacmd_updater::base64;
use megacmd_updater::verify::PublicKey;

const N_DEC: &str = "165649837088360520999750444742592843303881462301710780436803715864614419868345712417218297163018513165349358333923803080111685824576105762468622985364949421699661902733865637128004040315523468820076073248415300693111027636553773262985259441279626520583477662606322156919297235467402707684412645513352916444163";
const E_DEC: &str = "65537";
const D_DEC: &str = "151199677352117526987885798930404258456111647998662417958246460518809750164402406530631529308509200261702528579814790122408426477045678726686803286456982664237946885522439931440870692181839172005776338374400825042209402848570194118430806202550695938304826802339905997851942051142956654980124359018449645668673";

pub fn public_key() -> PublicKey {
    PublicKey { exponent: E_DEC.parse().unwrap(), modulus: N_DEC.parse().unwrap() }
}

fn private_exponent() -> BigUint {
    D_DEC.parse().unwrap()
}

fn modulus() -> BigUint {
    N_DEC.parse().unwrap()
}

pub fn sign(message: &[u8]) -> String {
    let digest = Sha512::digest(message);
    let h = BigUint::from_bytes_be(&digest);
    let s = h.modpow(&private_exponent(), &modulus());
    let mut bytes = s.to_bytes_be();
    let mut padded = vec![0u8; 512 - bytes.len()];
    padded.append(&mut bytes);
    base64::encode(&padded)
}

pub fn signed_manifest(version: u64, entries: &[(&str, &str, &[u8])]) -> String {
    let version_line = version.to_string();

    let mut message = Vec::new();
    message.extend_from_slice(version_line.as_bytes());
    let mut body = String::new();
    for (url, relative_path, contents) in entries {
        let file_sig = sign(contents);
        message.extend_from_slice(url.as_bytes());
        message.extend_from_slice(relative_path.as_bytes());
        message.extend_from_slice(file_sig.as_bytes());
        body.push_str(&format!("{url}\n{relative_path}\n{file_sig}\n"));
    }
    let manifest_signature = sign(&message);

    format!("{version_line}\n{manifest_signature}\n{body}\n")
}

/// Reserves a local port without yet serving anything. Tests need the base
/// URL up front to build absolute URLs into the manifest before the
/// response bodies (which include the manifest itself) can be assembled.
pub fn bind_stub_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("http://{addr}"))
}

/// Starts a background thread serving fixed byte bodies for a fixed set of
/// paths (query strings, including the cache-busting suffix, are ignored).
/// The thread runs until the test process exits.
pub fn serve_stub_server(listener: TcpListener, responses: HashMap<String, Vec<u8>>) {
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 8192];
            let Ok(n) = stream.read(&mut buf) else { continue };
            let request = String::from_utf8_lossy(&buf[..n]);
            let path = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/")
                .split('?')
                .next()
                .unwrap_or("/")
                .to_string();

            match responses.get(&path) {
                Some(body) => {
                    let header = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = stream.write_all(header.as_bytes());
                    let _ = stream.write_all(body);
                }
                None => {
                    let header = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
                    let _ = stream.write_all(header.as_bytes());
                }
            }
        }
    });
}
