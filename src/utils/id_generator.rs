//! Random identifier generation for short ids and anonymous owners.
//!
//! Identifiers are drawn uniformly from a 62-character alphanumeric alphabet
//! using the operating system's CSPRNG via `getrandom`.
//!
//! # Choosing a length
//!
//! With `n` identifiers of length `L` already issued, the chance that a new
//! one collides is about `n / 62^L`, and the chance of at least one collision
//! among `n` is about `n^2 / (2 * 62^L)`:
//!
//! | `L` | `62^L`    | 1M ids, any collision |
//! |-----|-----------|-----------------------|
//! | 4   | 1.5e7     | certain               |
//! | 6   | 5.7e10    | ~99.9%                |
//! | 8   | 2.2e14    | ~0.2%                 |
//! | 10  | 8.4e17    | ~6e-7                 |
//!
//! A collision is never silent: the store rejects a taken id and the service
//! retries with a fresh one, so shorter ids cost retries, not correctness.

/// Characters an identifier is drawn from.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Bytes at or above this value are rejected to keep `byte % 62` uniform.
const ACCEPT_BELOW: u8 = (256 - 256 % ALPHABET.len()) as u8;

/// Failure of the random source.
#[derive(Debug, thiserror::Error)]
pub enum IdGenError {
    #[error("random source failed: {0}")]
    RandomSource(getrandom::Error),
}

/// Generates a random alphanumeric identifier of exactly `length` characters.
///
/// # Errors
///
/// Returns [`IdGenError::RandomSource`] if the OS random source fails. The
/// caller must abort whatever the id was for.
///
/// # Examples
///
/// ```ignore
/// let id = generate_id(8)?;
/// assert_eq!(id.len(), 8);
/// assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_id(length: usize) -> Result<String, IdGenError> {
    let mut id = String::with_capacity(length);
    let mut buffer = [0u8; 64];

    while id.len() < length {
        getrandom::fill(&mut buffer).map_err(IdGenError::RandomSource)?;

        for &byte in buffer.iter().filter(|&&b| b < ACCEPT_BELOW) {
            if id.len() == length {
                break;
            }
            id.push(char::from(ALPHABET[usize::from(byte) % ALPHABET.len()]));
        }
    }

    Ok(id)
}
