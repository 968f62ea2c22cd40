//! Password strength rules for self-service registration.

use crate::error::Error;

/// Characters that satisfy the special-character rule.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

const MIN_PASSWORD_LENGTH: usize = 8;

/// Check a candidate password against the strength rules.
///
/// On failure the error lists every unmet rule, so the user can fix them all
/// in one go.
pub fn validate_password(password: &str) -> Result<(), Error> {
    let mut unmet = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        unmet.push("at least 8 characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        unmet.push("one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        unmet.push("one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        unmet.push("one number".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        unmet.push("one special character".to_string());
    }

    if unmet.is_empty() {
        Ok(())
    } else {
        Err(Error::WeakPassword(unmet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unmet_rules(password: &str) -> Vec<String> {
        match validate_password(password) {
            Err(Error::WeakPassword(unmet)) => unmet,
            other => panic!("expected WeakPassword, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_strong_password() {
        assert!(validate_password("Aa1!aaaa").is_ok());
        assert!(validate_password("S3cure,Pass").is_ok());
    }

    #[test]
    fn reports_every_unmet_rule() {
        assert_eq!(
            unmet_rules("aaaaaaaa"),
            vec!["one uppercase letter", "one number", "one special character"]
        );
        assert_eq!(
            unmet_rules(""),
            vec![
                "at least 8 characters",
                "one uppercase letter",
                "one lowercase letter",
                "one number",
                "one special character"
            ]
        );
    }

    #[test]
    fn length_is_counted_in_characters() {
        // Four two-byte characters plus four ASCII is still eight characters.
        assert!(validate_password("Aa1!ññññ").is_ok());
        assert_eq!(unmet_rules("Aa1!ñññ"), vec!["at least 8 characters"]);
    }

    #[test]
    fn every_listed_special_character_counts() {
        for special in SPECIAL_CHARACTERS.chars() {
            let password = format!("Aa1aaaa{special}");
            assert!(validate_password(&password).is_ok(), "rejected {special:?}");
        }
        // A character outside the list does not count.
        assert_eq!(unmet_rules("Aa1aaaa-"), vec!["one special character"]);
    }
}
