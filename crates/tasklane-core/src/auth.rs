use std::sync::OnceLock;

use regex::Regex;

use crate::error::{TaskError, TaskResult};

const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

fn special_char_regex() -> Option<&'static Regex> {
    static SPECIAL: OnceLock<Option<Regex>> = OnceLock::new();
    SPECIAL
        .get_or_init(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).ok())
        .as_ref()
}

pub fn validate_email(email: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(email))
}

pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

pub fn validate_name(name: &str) -> bool {
    name.trim().chars().count() >= MIN_NAME_LEN
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStrength {
    Invalid,
    Weak,
    Medium,
    Strong,
}

impl PasswordStrength {
    pub fn is_valid(self) -> bool {
        self != Self::Invalid
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Invalid => "Password must be at least 6 characters",
            Self::Weak => "Weak password",
            Self::Medium => "Medium password",
            Self::Strong => "Strong password",
        }
    }
}

pub fn password_strength(password: &str) -> PasswordStrength {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return PasswordStrength::Invalid;
    }
    if len < 8 {
        return PasswordStrength::Weak;
    }

    let classes = [
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        special_char_regex().is_some_and(|re| re.is_match(password)),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();

    if classes >= 3 && len >= 10 {
        PasswordStrength::Strong
    } else if classes >= 2 {
        PasswordStrength::Medium
    } else {
        PasswordStrength::Weak
    }
}

/// Sign-up input. Only `name` and `password` reach the backend; the email
/// is checked locally.
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> TaskResult<()> {
        if !validate_name(&self.name) {
            return Err(TaskError::Validation(
                "Name must be at least 2 characters".to_string(),
            ));
        }
        if !validate_email(&self.email) {
            return Err(TaskError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }
        if !validate_password(&self.password) {
            return Err(TaskError::Validation(
                PasswordStrength::Invalid.message().to_string(),
            ));
        }
        Ok(())
    }
}

pub fn validate_login(username: &str, password: &str) -> TaskResult<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(TaskError::Validation(
            "Username and password are required".to_string(),
        ));
    }
    Ok(())
}
