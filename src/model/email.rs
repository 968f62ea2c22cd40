//! University-issued student email addresses.
//!
//! Registration is restricted to addresses of the form
//! `<student number>@ub.ac.bw` or `<student number>@student.ub.bw`, where the
//! student number encodes an enrolment year between 2020 and 2025. The student
//! number doubles as the account's unique student ID, so parsing is strict and
//! happens exactly once, at the edge.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domains that university mailboxes live under.
const UNIVERSITY_DOMAINS: [&str; 2] = ["ub.ac.bw", "student.ub.bw"];

lazy_static! {
    /// A student number: enrolment year 2020-2025 followed by a five-digit serial.
    static ref STUDENT_NUMBER: Regex =
        Regex::new(r"^202[0-5]\d{5}$").expect("Hard-coded regex is valid");
}

/// A validated, normalised (lowercase) student email address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudentEmail(String);

impl StudentEmail {
    /// The full address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The student number, i.e. the local part of the address.
    pub fn student_id(&self) -> &str {
        // Parsing guarantees exactly one '@'.
        self.0.split('@').next().expect("Validated on construction")
    }
}

impl TryFrom<String> for StudentEmail {
    type Error = EmailParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl FromStr for StudentEmail {
    type Err = EmailParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalised = raw.trim().to_lowercase();
        let (local, domain) = normalised.split_once('@').ok_or(EmailParseError)?;
        if !UNIVERSITY_DOMAINS.contains(&domain) || !STUDENT_NUMBER.is_match(local) {
            return Err(EmailParseError);
        }
        Ok(Self(normalised))
    }
}

impl From<StudentEmail> for String {
    fn from(email: StudentEmail) -> Self {
        email.0
    }
}

impl Display for StudentEmail {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rejection for addresses outside the university's namespace.
///
/// The message deliberately does not distinguish the failure cause; it is
/// shown to users as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid UB email format. Must be: [9-digit-student-id]@ub.ac.bw or @student.ub.bw (e.g., 202207201@ub.ac.bw)")]
pub struct EmailParseError;

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn accepts_both_university_domains() {
        for raw in ["202207201@ub.ac.bw", "202400001@student.ub.bw"] {
            let email: StudentEmail = raw.parse().unwrap();
            assert_eq!(email.as_str(), raw);
        }
    }

    #[test]
    fn normalises_case_and_whitespace() {
        let email: StudentEmail = "  202207201@UB.AC.BW ".parse().unwrap();
        assert_eq!(email.as_str(), "202207201@ub.ac.bw");
    }

    #[test]
    fn extracts_student_number() {
        let email: StudentEmail = "202207201@ub.ac.bw".parse().unwrap();
        assert_eq!(email.student_id(), "202207201");
    }

    #[test]
    fn rejects_enrolment_years_outside_window() {
        assert!("201907201@ub.ac.bw".parse::<StudentEmail>().is_err());
        assert!("202607201@ub.ac.bw".parse::<StudentEmail>().is_err());
    }

    #[test]
    fn rejects_malformed_local_parts() {
        for raw in [
            "abc@ub.ac.bw",
            "2022072@ub.ac.bw",
            "2022072011@ub.ac.bw",
            "20220720a@ub.ac.bw",
            "202207201@",
            "202207201",
        ] {
            assert!(raw.parse::<StudentEmail>().is_err(), "accepted {raw}");
        }
    }

    #[test]
    fn rejects_foreign_domains() {
        assert!("202207201@gmail.com".parse::<StudentEmail>().is_err());
        assert!("202207201@ub.ac.bw.evil.com".parse::<StudentEmail>().is_err());
    }

    #[test]
    fn serde_round_trips_through_string() {
        let email: StudentEmail =
            serde_json::from_str("\"202207201@ub.ac.bw\"").unwrap();
        assert_eq!(email.student_id(), "202207201");
        assert!(serde_json::from_str::<StudentEmail>("\"foo@gmail.com\"").is_err());
    }
}
