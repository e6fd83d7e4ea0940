//! Short-link tokens built from allocated ids.

use {
    super::{AllocationResult, IdSource},
    auto_impl::auto_impl,
    tracing::debug,
};

/// Alphabet of the base62 encoding, in digit order.
const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const BASE: i64 = 62;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// Only non-negative numbers have an encoding.
    #[error("Cannot encode negative number {0}")]
    Negative(i64),

    #[error("Empty input")]
    Empty,

    #[error("Invalid character {0:?}")]
    InvalidCharacter(char),

    /// Decoded value does not fit into `i64`.
    #[error("Encoded value {0:?} overflows")]
    Overflow(String),
}

/// Reversible mapping between numbers and strings.
#[auto_impl(&, Box, Arc)]
pub trait Encoder {
    fn encode(&self, num: i64) -> Result<String, EncodeError>;

    fn decode(&self, encoded: &str) -> Result<i64, EncodeError>;
}

/// Base62 encoding, most significant digit first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base62;

impl Encoder for Base62 {
    fn encode(&self, mut num: i64) -> Result<String, EncodeError> {
        if num < 0 {
            return Err(EncodeError::Negative(num));
        }
        if num == 0 {
            return Ok((ALPHABET[0] as char).to_string());
        }

        let mut digits = Vec::with_capacity(11);
        while num > 0 {
            digits.push(ALPHABET[(num % BASE) as usize]);
            num /= BASE;
        }
        digits.reverse();

        Ok(digits.into_iter().map(char::from).collect())
    }

    fn decode(&self, encoded: &str) -> Result<i64, EncodeError> {
        if encoded.is_empty() {
            return Err(EncodeError::Empty);
        }

        encoded.chars().try_fold(0i64, |num, c| {
            let digit = digit(c).ok_or(EncodeError::InvalidCharacter(c))?;
            num.checked_mul(BASE)
                .and_then(|num| num.checked_add(digit))
                .ok_or_else(|| EncodeError::Overflow(encoded.to_string()))
        })
    }
}

fn digit(c: char) -> Option<i64> {
    let value = match c {
        '0'..='9' => c as u8 - b'0',
        'A'..='Z' => c as u8 - b'A' + 10,
        'a'..='z' => c as u8 - b'a' + 36,
        _ => return None,
    };
    Some(value as i64)
}

/// Generates short-link tokens.
///
/// A token is the encoded id followed by a single checksum character derived
/// from the original URL and the user id. Tokens are unique because ids are.
pub struct ShortLinkGenerator<S, E = Base62> {
    ids: S,
    encoder: E,
}

impl<S: IdSource> ShortLinkGenerator<S> {
    pub fn new(ids: S) -> Self {
        Self::with_encoder(ids, Base62)
    }
}

impl<S: IdSource, E: Encoder> ShortLinkGenerator<S, E> {
    pub fn with_encoder(ids: S, encoder: E) -> Self {
        Self { ids, encoder }
    }

    /// Takes the next id from the source and turns it into a token.
    pub async fn generate(&self, original_url: &str, user_id: &str) -> AllocationResult<String> {
        let id = self.ids.next_id().await?;
        let token = self.token(id, original_url, user_id)?;
        debug!(id, token = %token, "Generated short link");
        Ok(token)
    }

    /// Token for a known id.
    pub fn token(&self, id: i64, original_url: &str, user_id: &str) -> Result<String, EncodeError> {
        let mut token = self.encoder.encode(id)?;
        token.push_str(&self.encoder.encode(checksum(original_url, user_id))?);
        Ok(token)
    }

    /// Source of ids used by the generator.
    pub fn ids(&self) -> &S {
        &self.ids
    }
}

/// CRC-32 (IEEE) of url and user id, reduced to a single base62 digit.
pub fn checksum(original_url: &str, user_id: &str) -> i64 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(original_url.as_bytes());
    hasher.update(user_id.as_bytes());
    hasher.finalize() as i64 % BASE
}
