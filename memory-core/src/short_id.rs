//! Hash-derived short ids (spec §4.1).
//!
//! A short id is a 5-character base32 string derived from the node's full
//! `Uuid` plus a small attempt counter. Callers probe for uniqueness inside
//! the same transaction that inserts the node: generate attempt 0, check the
//! store, and if taken, regenerate with attempt 1, 2, ... up to
//! [`crate::constants::short_id::MAX_COLLISION_RETRIES`].

use crate::constants::short_id::{ALPHABET, LENGTH, MAX_COLLISION_RETRIES};
use crate::error::{Error, Result};
use uuid::Uuid;

/// Derive the candidate short id for `id` at collision-probe `attempt`.
#[must_use]
pub fn candidate(id: Uuid, attempt: u32) -> String {
    let mut hasher_input = id.as_bytes().to_vec();
    hasher_input.extend_from_slice(&attempt.to_le_bytes());
    let digest = fnv1a(&hasher_input);

    let alphabet = ALPHABET.as_bytes();
    let base = alphabet.len() as u64;
    let mut value = digest;
    let mut chars = Vec::with_capacity(LENGTH);
    for _ in 0..LENGTH {
        let idx = (value % base) as usize;
        chars.push(alphabet[idx]);
        value /= base;
    }
    // Safety: ALPHABET is ASCII-only.
    String::from_utf8(chars).expect("alphabet is ASCII")
}

/// Generate a unique short id by probing `exists` for collisions.
///
/// `exists` should check uniqueness within the same node kind (episodes,
/// traces, entities each have their own short-id namespace) and, ideally,
/// within the same store transaction as the eventual insert.
pub fn generate_unique(
    id: Uuid,
    mut exists: impl FnMut(&str) -> Result<bool>,
) -> Result<String> {
    for attempt in 0..MAX_COLLISION_RETRIES {
        let candidate = candidate(id, attempt);
        if !exists(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(Error::Storage(format!(
        "exhausted {MAX_COLLISION_RETRIES} short-id attempts for {id}"
    )))
}

/// Small non-cryptographic hash (FNV-1a, 64-bit). Deterministic across runs,
/// which is what the collision-probe sequence needs; it is not used for any
/// security-sensitive purpose.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_is_fixed_length_and_alphabet_restricted() {
        let id = Uuid::new_v4();
        let c = candidate(id, 0);
        assert_eq!(c.len(), LENGTH);
        assert!(c.chars().all(|ch| ALPHABET.contains(ch)));
    }

    #[test]
    fn candidate_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(candidate(id, 0), candidate(id, 0));
    }

    #[test]
    fn different_attempts_usually_differ() {
        let id = Uuid::new_v4();
        assert_ne!(candidate(id, 0), candidate(id, 1));
    }

    #[test]
    fn generate_unique_retries_on_collision() {
        let id = Uuid::new_v4();
        let first = candidate(id, 0);
        let mut seen_first = false;
        let result = generate_unique(id, |c| {
            if c == first && !seen_first {
                seen_first = true;
                Ok(true)
            } else {
                Ok(false)
            }
        })
        .unwrap();
        assert_ne!(result, first);
    }

    #[test]
    fn generate_unique_gives_up_eventually() {
        let id = Uuid::new_v4();
        let result = generate_unique(id, |_| Ok(true));
        assert!(result.is_err());
    }
}
