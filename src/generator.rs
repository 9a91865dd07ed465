// src/generator.rs
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

pub const UPPERCASE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWERCASE_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const NUMBER_CHARS: &[u8] = b"0123456789";
pub const SYMBOL_CHARS: &[u8] = b"!@#$%^&*()";

/// Upper bound accepted by the command line; the generator itself has none.
pub const MAX_PASSWORD_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCriteria {
    pub length: usize,
    pub include_symbols: bool,
}

impl Default for PasswordCriteria {
    fn default() -> Self {
        PasswordCriteria {
            length: 12,
            include_symbols: false,
        }
    }
}

impl PasswordCriteria {
    fn pools(&self) -> Vec<&'static [u8]> {
        let mut pools = vec![UPPERCASE_CHARS, LOWERCASE_CHARS, NUMBER_CHARS];
        if self.include_symbols {
            pools.push(SYMBOL_CHARS);
        }
        pools
    }
}

/// Generates a random password.
///
/// One character from every active pool is always present, so the result is
/// never shorter than the number of pools (3, or 4 with symbols). The remaining
/// positions are drawn uniformly from the union of the pools and the whole
/// sequence is shuffled afterwards.
pub fn generate_password(criteria: &PasswordCriteria) -> String {
    let mut rng = thread_rng();
    let pools = criteria.pools();
    let charset: Vec<u8> = pools.iter().flat_map(|pool| pool.iter().copied()).collect();

    let mut password_bytes: Vec<u8> = Vec::with_capacity(criteria.length.max(pools.len()));
    for pool in &pools {
        password_bytes.push(pool[rng.gen_range(0..pool.len())]);
    }

    let remaining = criteria.length.saturating_sub(pools.len());
    for _ in 0..remaining {
        password_bytes.push(charset[rng.gen_range(0..charset.len())]);
    }

    password_bytes.shuffle(&mut rng);
    // Every byte comes from the ASCII pools above.
    password_bytes.into_iter().map(char::from).collect()
}

/// Shorthand for [`generate_password`].
pub fn generate(length: usize, include_symbols: bool) -> String {
    generate_password(&PasswordCriteria { length, include_symbols })
}
