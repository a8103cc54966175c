use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ClientError, ClientResult};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn validate_email(email: &str) -> ClientResult<()> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(ClientError::Validation(format!("'{}' is not a valid email address", email)))
    }
}

pub fn validate_full_name(full_name: &str) -> ClientResult<()> {
    if full_name.trim().is_empty() {
        Err(ClientError::Validation("Full name is required".to_string()))
    } else {
        Ok(())
    }
}
