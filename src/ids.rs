use rand::{rngs::OsRng, Rng};
use uuid::Uuid;

/// Length of every token key. Stored keys and clients depend on it.
pub const TOKEN_KEY_LEN: usize = 40;

const TOKEN_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-";

/// Primary identifier for every domain record.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Random key for an auth token, drawn from the OS CSPRNG.
pub fn generate_token_key() -> String {
    let mut rng = OsRng;
    (0..TOKEN_KEY_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn new_id_is_a_canonical_uuid() {
        let id = new_id();
        assert_eq!(id.len(), 36);
        assert_eq!(Uuid::parse_str(&id).unwrap().to_string(), id);
    }

    #[test]
    fn token_key_has_fixed_length_and_alphabet() {
        let key = generate_token_key();
        assert_eq!(key.len(), TOKEN_KEY_LEN);
        assert!(key.bytes().all(|b| TOKEN_ALPHABET.contains(&b)));
    }

    #[test]
    fn token_keys_do_not_collide() {
        let keys: HashSet<String> = (0..1000).map(|_| generate_token_key()).collect();
        assert_eq!(keys.len(), 1000);
    }
}
