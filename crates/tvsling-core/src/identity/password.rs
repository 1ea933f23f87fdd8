// Bundle-password generation.

use rand::Rng;
use rand::seq::SliceRandom;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// Generate a high-entropy password of at least 12 characters, guaranteed
/// to contain at least one upper-case letter, one lower-case letter, and
/// one digit. The remaining positions are drawn from the combined
/// alphabet, then the whole string is shuffled so the guaranteed classes
/// do not sit at fixed offsets.
pub fn generate_password(length: usize) -> String {
    let length = length.max(12);
    let mut rng = rand::thread_rng();

    let combined: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS].concat();

    let mut bytes = Vec::with_capacity(length);
    bytes.push(pick(UPPERCASE, &mut rng));
    bytes.push(pick(LOWERCASE, &mut rng));
    bytes.push(pick(DIGITS, &mut rng));
    while bytes.len() < length {
        bytes.push(pick(&combined, &mut rng));
    }
    bytes.shuffle(&mut rng);

    bytes.iter().map(|b| char::from(*b)).collect()
}

fn pick(alphabet: &[u8], rng: &mut impl Rng) -> u8 {
    alphabet.choose(rng).copied().unwrap_or(b'x')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_and_character_classes() {
        for _ in 0..200 {
            let password = generate_password(12);
            assert_eq!(password.len(), 12);
            assert!(password.chars().any(|c| c.is_ascii_uppercase()));
            assert!(password.chars().any(|c| c.is_ascii_lowercase()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn short_requests_are_raised_to_minimum() {
        assert_eq!(generate_password(4).len(), 12);
    }

    #[test]
    fn longer_lengths_are_honoured() {
        assert_eq!(generate_password(24).len(), 24);
    }
}
