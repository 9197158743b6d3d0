/// Request field validation
///
/// Field rules used by the `validator` derives on request bodies, and the
/// conversion of `validator` errors into the field list returned to clients.
use crate::error::{ApiError, FieldError};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Letters, digits and underscore; length checked separately
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(rule(
            "username_charset",
            "Username can only contain letters, digits and underscores",
        ))
    }
}

/// Letters, spaces, hyphens, apostrophes and periods
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(rule("name_blank", "Name cannot be blank"));
    }

    if name
        .chars()
        .all(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.'))
    {
        Ok(())
    } else {
        Err(rule("name_charset", "Name contains invalid characters"))
    }
}

/// At least one lowercase letter, one uppercase letter and one digit
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_lower && has_upper && has_digit {
        Ok(())
    } else {
        Err(rule(
            "password_strength",
            "Password must contain a lowercase letter, an uppercase letter and a digit",
        ))
    }
}

/// Run `validator` on a request and map failures to `ApiError::Validation`
pub fn validate_request<T: Validate>(request: &T) -> Result<(), ApiError> {
    request
        .validate()
        .map_err(|errors| ApiError::Validation(field_errors(&errors)))
}

/// Flatten `validator` errors into one entry per offending field, sorted by field
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .errors()
        .iter()
        .filter_map(|(field, kind)| match kind {
            ValidationErrorsKind::Field(errs) => errs.first().map(|err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| describe(field, &err.code));
                FieldError::new(field.to_string(), message)
            }),
            _ => None,
        })
        .collect();

    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

fn describe(field: &str, code: &str) -> String {
    match code {
        "email" => "Invalid email address".to_string(),
        "length" => format!("The {} field has an invalid length", field),
        "required" => format!("The {} field is missing", field),
        other => format!("The {} field is invalid ({})", field, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(
            length(min = 5, max = 25),
            custom(function = "validate_username")
        )]
        username: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("alice@x").is_err());
        assert!(validate_username("al ice").is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("Mary-Jane O'Neil").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("R2D2").is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Secret123").is_ok());
        assert!(validate_password_strength("secret123").is_err());
        assert!(validate_password_strength("SECRET123").is_err());
        assert!(validate_password_strength("SecretPass").is_err());
    }

    #[test]
    fn test_field_errors_enumerate_offenders() {
        let sample = Sample {
            username: "a!".to_string(),
            email: "not-an-email".to_string(),
        };

        let err = validate_request(&sample).unwrap_err();
        match err {
            ApiError::Validation(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "username"]);
                assert_eq!(fields[0].message, "Invalid email address");
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let sample = Sample {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
        };
        assert!(validate_request(&sample).is_ok());
    }
}
