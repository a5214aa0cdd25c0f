use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::errors::AppError;

#[derive(Debug, Validate, Deserialize)]
pub struct SignUpForm {
    #[validate(length(min = 1, max = 150, message = "Username must have between 1 and 150 characters."))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "First name is too long."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Last name is too long."))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Validate, Deserialize)]
pub struct SignInForm {
    #[validate(length(min = 1, message = "Username is required."))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

#[derive(Debug, Validate, Deserialize)]
pub struct PasswordResetRequestForm {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

#[derive(Debug, Validate, Deserialize)]
pub struct PasswordResetForm {
    pub password: String,
    pub confirm_password: String,
}

/// Every rule the password breaks, in a fixed order.
pub fn password_problems(password: &str) -> Vec<String> {
    static UPPERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]").unwrap());
    static LOWERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").unwrap());
    static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").unwrap());
    static SPECIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[@#$%^&+=]").unwrap());

    let mut problems = Vec::new();
    if password.chars().count() < 8 {
        problems.push("Password must be at least 8 characters long.".to_owned());
    }
    if !UPPERCASE.is_match(password) {
        problems.push("Password must contain at least one uppercase letter.".to_owned());
    }
    if !LOWERCASE.is_match(password) {
        problems.push("Password must contain at least one lowercase letter.".to_owned());
    }
    if !DIGIT.is_match(password) {
        problems.push("Password must contain at least one number.".to_owned());
    }
    if !SPECIAL.is_match(password) {
        problems.push("Password must contain at least one special character (@#$%^&+=).".to_owned());
    }
    problems
}

/// Runs the derived rules plus the password rules and reports them all at once.
pub fn check_new_password<T: Validate>(
    form: &T,
    password: &str,
    confirm_password: &str,
) -> Result<(), AppError> {
    let mut problems = match form.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => validation_messages(&errors),
    };
    problems.extend(password_problems(password));
    if password != confirm_password {
        problems.push("Password and Confirm Password does not match.".to_owned());
    }

    if problems.is_empty() {
        return Ok(());
    }
    Err(AppError::Validation(problems))
}

pub fn validate_form<T: Validate>(form: &T) -> Result<(), AppError> {
    form.validate()
        .map_err(|errors| AppError::Validation(validation_messages(&errors)))
}

fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid.", field),
            })
        })
        .collect();
    messages.sort();
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_password_has_no_problems() {
        assert!(password_problems("Str0ng@pass").is_empty());
    }

    #[test]
    fn test_every_broken_rule_is_listed() {
        let problems = password_problems("abc");
        assert_eq!(problems.len(), 4);
        assert!(problems[0].contains("at least 8 characters"));
        assert!(problems.iter().any(|p| p.contains("uppercase")));
        assert!(problems.iter().any(|p| p.contains("number")));
        assert!(problems.iter().any(|p| p.contains("special character")));
    }

    #[test]
    fn test_sign_up_form_reports_email_and_mismatch() {
        let form = SignUpForm {
            username: "ana".into(),
            first_name: String::new(),
            last_name: String::new(),
            email: "not-an-email".into(),
            password: "Str0ng@pass".into(),
            confirm_password: "Str0ng@pas".into(),
        };
        let Err(AppError::Validation(problems)) =
            check_new_password(&form, &form.password, &form.confirm_password)
        else {
            panic!("the form should be rejected");
        };
        assert!(problems.contains(&"Enter a valid email address.".to_owned()));
        assert!(problems.contains(&"Password and Confirm Password does not match.".to_owned()));
    }
}
