use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use crate::models::{NewUser, UserPayload};

/// ValidationError
///
/// Raised when an identifier or payload does not satisfy the user schema. The message
/// names the offending field, e.g. `"email" is required`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Schema field order: (struct field, wire name). The first violating field in this
/// order is the one reported.
const USER_FIELDS: [(&str, &str); 5] = [
    ("email", "email"),
    ("name", "name"),
    ("age", "age"),
    ("city", "city"),
    ("zip_code", "zipCode"),
];

/// validate_id
///
/// An identifier must be a non-empty string. Whether it names an existing user is
/// decided further down.
pub fn validate_id(id: &str) -> Result<&str, ValidationError> {
    if id.is_empty() {
        return Err(ValidationError(
            "\"userId\" is not allowed to be empty".to_string(),
        ));
    }
    Ok(id)
}

/// validate_user
///
/// Checks a create/full-update body against the user schema and returns the typed
/// value. Only the first violation is reported.
pub fn validate_user(payload: &Value) -> Result<NewUser, ValidationError> {
    let payload: UserPayload = serde_json::from_value(payload.clone())
        .map_err(|e| ValidationError(e.to_string()))?;

    if let Err(errors) = payload.validate() {
        return Err(first_violation(&errors));
    }

    match payload {
        UserPayload {
            email: Some(email),
            name: Some(name),
            age: Some(age),
            city: Some(city),
            zip_code: Some(zip_code),
        } => Ok(NewUser {
            email,
            name,
            age,
            city,
            zip_code,
        }),
        // `required` has already rejected any missing field.
        _ => Err(ValidationError("\"value\" is incomplete".to_string())),
    }
}

fn first_violation(errors: &validator::ValidationErrors) -> ValidationError {
    let field_errors = errors.field_errors();

    for (field, label) in USER_FIELDS {
        let Some(violations) = field_errors
            .get(field)
            .or_else(|| field_errors.get(label))
        else {
            continue;
        };

        // `required` takes precedence over the value rules.
        let violation = violations
            .iter()
            .find(|v| v.code == "required")
            .or_else(|| violations.first());

        if let Some(violation) = violation {
            let reason = violation
                .message
                .as_deref()
                .unwrap_or("is invalid");
            return ValidationError(format!("\"{label}\" {reason}"));
        }
    }

    ValidationError(errors.to_string())
}
