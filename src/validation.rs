//! Input checks applied by the HTTP handlers before touching the store

use std::sync::LazyLock;

use regex_lite::Regex;

/// Longest accepted chirp, in characters
pub const MAX_CHIRP_LENGTH: usize = 140;

const PROFANE_WORDS: [&str; 3] = ["kerfuffle", "sharbert", "fornax"];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 8 characters with an uppercase letter, a lowercase letter and a digit.
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("password is too short, it must contain at least 8 characters");
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("password must contain uppercase letters");
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("password must contain lowercase letters");
    }
    if !password.chars().any(char::is_numeric) {
        return Err("password must contain numbers");
    }
    Ok(())
}

pub fn is_valid_chirp_length(body: &str) -> bool {
    body.chars().count() <= MAX_CHIRP_LENGTH
}

/// Masks every space-separated word containing a profane term, ignoring case.
pub fn clean_profanity(body: &str) -> String {
    body.split(' ')
        .map(|word| {
            let lower = word.to_lowercase();
            if PROFANE_WORDS.iter().any(|bad| lower.contains(bad)) {
                "****"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_valid_email("walt@breakingbad.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email("walt"));
        assert!(!is_valid_email("walt@localhost"));
        assert!(!is_valid_email("walt @breakingbad.com"));
    }

    #[test]
    fn passwords() {
        assert!(validate_password("Heisenberg1").is_ok());
        assert!(validate_password("Short1").is_err());
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("ALLUPPERCASE1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
        // Any Unicode digit counts
        assert!(validate_password("Heisenberg\u{0663}").is_ok());
    }

    #[test]
    fn profanity_is_masked_case_insensitively() {
        assert_eq!(
            clean_profanity("I had something interesting for breakfast"),
            "I had something interesting for breakfast"
        );
        assert_eq!(
            clean_profanity("I hear Mastodon is better than Chirpy. sharbert I need to migrate"),
            "I hear Mastodon is better than Chirpy. **** I need to migrate"
        );
        assert_eq!(clean_profanity("what a Kerfuffle!"), "what a ****");
        assert_eq!(clean_profanity("Fornax"), "****");
    }

    #[test]
    fn chirp_length_counts_characters() {
        assert!(is_valid_chirp_length(&"a".repeat(MAX_CHIRP_LENGTH)));
        assert!(!is_valid_chirp_length(&"a".repeat(MAX_CHIRP_LENGTH + 1)));
        assert!(is_valid_chirp_length(&"é".repeat(MAX_CHIRP_LENGTH)));
    }
}
