// Identifier generation: game codes, player ids, session ids
// Game codes are short and human-shareable; the rest are opaque

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a game code (uppercase letters).
const GAME_CODE_LEN: usize = 6;

/// Generate a short, human-friendly game code (6 uppercase letters)
pub fn generate_game_code() -> String {
    let mut rng = rand::thread_rng();
    (0..GAME_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..26);
            (b'A' + idx) as char
        })
        .collect()
}

/// Format a game code for display: "KWRTXQ" becomes "KWR-TXQ".
/// Codes of unexpected length are passed through uppercased.
pub fn format_game_code(code: &str) -> String {
    let upper = code.to_ascii_uppercase();
    if upper.len() == GAME_CODE_LEN {
        format!("{}-{}", &upper[..3], &upper[3..])
    } else {
        upper
    }
}

/// Normalize user input back to the canonical code form (strip the hyphen).
pub fn normalize_game_code(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Generate an opaque player id
pub fn generate_player_id() -> String {
    format!("p-{}", random_token(12))
}

/// Generate an opaque session id for the relay store
pub fn generate_session_id() -> String {
    format!("s-{}", random_token(16))
}

/// Milliseconds since the unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn random_token(len: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_code_shape() {
        let code = generate_game_code();
        assert_eq!(code.len(), GAME_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_format_and_normalize_round_trip() {
        let code = "KWRTXQ";
        let display = format_game_code(code);
        assert_eq!(display, "KWR-TXQ");
        assert_eq!(normalize_game_code(&display), code);
    }

    #[test]
    fn test_normalize_accepts_lowercase_input() {
        assert_eq!(normalize_game_code("kwr-txq"), "KWRTXQ");
    }

    #[test]
    fn test_player_and_session_ids_are_distinct() {
        // Not a uniqueness proof, just a sanity check on the namespaces
        let p = generate_player_id();
        let s = generate_session_id();
        assert!(p.starts_with("p-"));
        assert!(s.starts_with("s-"));
        assert_ne!(generate_session_id(), s);
    }
}
