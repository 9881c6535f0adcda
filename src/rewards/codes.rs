use rand::{Rng, rngs::OsRng};

/// Uppercase letters and digits without the look-alikes 0/O and 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const CODE_LEN: usize = 8;

/// How many fresh codes are tried before giving up on a collision streak.
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// Random redemption code such as `K7QM-2WXA`.
pub fn generate_code() -> String {
    let mut rng = OsRng;
    let mut code = String::with_capacity(CODE_LEN + 1);
    for i in 0..CODE_LEN {
        if i == CODE_LEN / 2 {
            code.push('-');
        }
        let idx = rng.gen_range(0..ALPHABET.len());
        code.push(char::from(ALPHABET[idx]));
    }
    code
}

/// Canonical form of a user-supplied code: trimmed and uppercased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
