//! Message id generation.
//!
//! Ids are 8 characters drawn uniformly from `[A-Za-z0-9]`, which gives
//! 62^8 (about 2.2e14) values. Collisions are not detected: by the birthday
//! bound a single client reaches a 50% collision chance only after roughly
//! 1.7e7 ids, and ids are only used to correlate replies within one client.

use rand::Rng;

/// Length of generated ids.
pub const ID_LEN: usize = 8;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh random id.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
