//! Cascade XOR keystream.
//!
//! This is an obfuscation layer, not encryption in any security sense.
//!
//! The transform is defined by one elementary step, `mask_suffix(i)`: every
//! byte at position `j >= i` is XORed with `K[(j - i) % K.len()] ^ (nonce | i)`
//! (low 8 bits of `i`). Encryption applies the step for `i = 0..L` in
//! increasing order, decryption for `i = L-1..=0` in decreasing order.
//!
//! Every step is an XOR, so both directions apply the same multiset of masks
//! to each byte and order has no effect on the result. The mask reaching
//! position `j` is therefore
//!
//! ```text
//! XOR_{d=0..=j} K[d % K.len()]  ^  XOR_{i=0..=j} (nonce | i)
//! ```
//!
//! which is two running prefix XORs. That lets the whole cascade run in one
//! linear pass while producing the same bytes as the quadratic definition.

use super::keys::Passphrase;

/// Which way the keystream is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Plaintext to ciphertext.
    Encrypt,
    /// Ciphertext to plaintext.
    Decrypt,
}

/// Apply the cascade keystream to `buf` in place.
pub fn transform(buf: &mut [u8], key: &Passphrase, nonce: u8, direction: Direction) {
    match direction {
        Direction::Encrypt => encrypt(buf, key, nonce),
        Direction::Decrypt => decrypt(buf, key, nonce),
    }
}

/// Encrypt `buf` in place.
pub fn encrypt(buf: &mut [u8], key: &Passphrase, nonce: u8) {
    cascade(buf, key.as_bytes(), nonce);
}

/// Decrypt `buf` in place.
pub fn decrypt(buf: &mut [u8], key: &Passphrase, nonce: u8) {
    cascade(buf, key.as_bytes(), nonce);
}

fn cascade(buf: &mut [u8], key: &[u8], nonce: u8) {
    debug_assert!(!key.is_empty());

    let mut key_acc = 0u8;
    let mut nonce_acc = 0u8;
    for (j, byte) in buf.iter_mut().enumerate() {
        key_acc ^= key[j % key.len()];
        nonce_acc ^= nonce | j as u8;
        *byte ^= key_acc ^ nonce_acc;
    }
}
