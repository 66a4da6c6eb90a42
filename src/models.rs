use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::repository::RepositoryError;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The persisted user record from the `users` table. `is_deleted` is the soft-delete
/// flag: it is never exposed to clients and every read path except deletion filters on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    // Assigned by the store on insert.
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub age: i64,
    pub city: String,
    pub zip_code: String,
    pub is_deleted: bool,
}

/// UserDto
///
/// The client-facing projection of a `User`. Only ever built from a record that was
/// actually found; the service turns a missing record into an error instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserDto {
    pub id: Uuid,
    #[schema(example = "a@b.com")]
    pub email: String,
    pub name: String,
    pub age: i64,
    pub city: String,
    #[schema(example = "00000")]
    pub zip_code: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            age: user.age,
            city: user.city,
            zip_code: user.zip_code,
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// UserPayload
///
/// The raw shape of a create/full-update body. Every field is optional at the serde
/// level so that a missing field is reported by the `required` rule with a readable
/// message; the remaining rules are declared on the fields and evaluated by
/// `validation::validate_user` in a fixed field order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserPayload {
    #[serde(default)]
    #[validate(
        required(message = "is required"),
        email(message = "must be a valid email"),
        custom(function = "validate_email_domain", message = "must be a valid email")
    )]
    #[schema(example = "a@b.com")]
    pub email: Option<String>,

    #[serde(default)]
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "is not allowed to be empty")
    )]
    pub name: Option<String>,

    /// Accepts integers, integral floats and integer strings.
    #[serde(default, deserialize_with = "lenient_integer")]
    #[validate(
        required(message = "is required"),
        range(min = 0, message = "must be greater than or equal to 0")
    )]
    pub age: Option<i64>,

    #[serde(default)]
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "is not allowed to be empty")
    )]
    pub city: Option<String>,

    #[serde(default)]
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "is not allowed to be empty")
    )]
    #[schema(example = "00000")]
    pub zip_code: Option<String>,
}

/// NewUser
///
/// A payload that passed validation: every field is present and within its rules.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub age: i64,
    pub city: String,
    pub zip_code: String,
}

/// UserChanges
///
/// The change set applied by an update. A full update sets every field; a partial
/// update sets whatever the client sent that maps onto a known field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub is_deleted: Option<bool>,
}

impl From<NewUser> for UserChanges {
    fn from(user: NewUser) -> Self {
        Self {
            email: Some(user.email),
            name: Some(user.name),
            age: Some(user.age),
            city: Some(user.city),
            zip_code: Some(user.zip_code),
            is_deleted: None,
        }
    }
}

impl UserChanges {
    /// from_document
    ///
    /// Casts an unvalidated update document onto the user schema, the way a document
    /// store casts an update: known fields are coerced to their column type, unknown
    /// fields are dropped, and values that cannot be coerced fail the whole update.
    /// No schema rules (email syntax, age range) are checked here.
    pub fn from_document(document: &Value) -> Result<Self, RepositoryError> {
        let fields: &Map<String, Value> = document.as_object().ok_or_else(|| {
            RepositoryError::InvalidUpdate("update document must be a JSON object".to_string())
        })?;

        let mut changes = Self::default();
        for (path, value) in fields {
            match path.as_str() {
                "email" => changes.email = Some(cast_string(path, value)?),
                "name" => changes.name = Some(cast_string(path, value)?),
                "age" => changes.age = Some(cast_integer(path, value)?),
                "city" => changes.city = Some(cast_string(path, value)?),
                "zipCode" => changes.zip_code = Some(cast_string(path, value)?),
                "isDeleted" => changes.is_deleted = Some(cast_bool(path, value)?),
                other => tracing::debug!(field = other, "ignoring field outside the user schema"),
            }
        }
        Ok(changes)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the change set to an in-memory record.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email.clone_from(email);
        }
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(age) = self.age {
            user.age = age;
        }
        if let Some(city) = &self.city {
            user.city.clone_from(city);
        }
        if let Some(zip_code) = &self.zip_code {
            user.zip_code.clone_from(zip_code);
        }
        if let Some(is_deleted) = self.is_deleted {
            user.is_deleted = is_deleted;
        }
    }
}

// --- Casting helpers ---

fn cast_error(path: &str, kind: &'static str, value: &Value) -> RepositoryError {
    RepositoryError::Cast {
        path: path.to_string(),
        kind,
        value: value.to_string(),
    }
}

fn cast_string(path: &str, value: &Value) -> Result<String, RepositoryError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(cast_error(path, "String", value)),
    }
}

fn cast_integer(path: &str, value: &Value) -> Result<i64, RepositoryError> {
    let parsed = match value {
        Value::Number(n) => integer_from_number(n),
        Value::String(s) => integer_from_str(s),
        _ => Err(IntegerCastError::NotANumber),
    };
    parsed.map_err(|_| cast_error(path, "Number", value))
}

fn cast_bool(path: &str, value: &Value) -> Result<bool, RepositoryError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" || s == "1" => Ok(true),
        Value::String(s) if s == "false" || s == "0" => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        _ => Err(cast_error(path, "Boolean", value)),
    }
}

/// Largest integer a JSON client can represent exactly (2^53 - 1).
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntegerCastError {
    NotANumber,
    NotAnInteger,
    Unsafe,
}

impl IntegerCastError {
    fn message(self) -> &'static str {
        match self {
            Self::NotANumber => "\"age\" must be a number",
            Self::NotAnInteger => "\"age\" must be an integer",
            Self::Unsafe => "\"age\" must be a safe number",
        }
    }
}

fn safe_integer(i: i64) -> Result<i64, IntegerCastError> {
    if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&i) {
        Ok(i)
    } else {
        Err(IntegerCastError::Unsafe)
    }
}

fn integer_from_float(f: f64) -> Result<i64, IntegerCastError> {
    if !f.is_finite() {
        return Err(IntegerCastError::NotANumber);
    }
    if f.fract() != 0.0 {
        return Err(IntegerCastError::NotAnInteger);
    }
    if f.abs() > MAX_SAFE_INTEGER as f64 {
        return Err(IntegerCastError::Unsafe);
    }
    Ok(f as i64)
}

/// Integer value of a JSON number, accepting floats with no fractional part.
fn integer_from_number(n: &serde_json::Number) -> Result<i64, IntegerCastError> {
    match n.as_i64() {
        Some(i) => safe_integer(i),
        None => n
            .as_f64()
            .ok_or(IntegerCastError::NotANumber)
            .and_then(integer_from_float),
    }
}

/// Integer value of a string such as `"42"`, `"42.0"` or `"4.2e1"`. Shared by the
/// create/full-update payload and the partial-update cast.
fn integer_from_str(s: &str) -> Result<i64, IntegerCastError> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return safe_integer(i);
    }
    s.parse::<f64>()
        .map_err(|_| IntegerCastError::NotANumber)
        .and_then(integer_from_float)
}

/// lenient_integer
///
/// Deserializes `age` from an integer, an integral float, or a string holding one.
/// Values outside the safe integer range are rejected. `null` is treated as absent
/// so the `required` rule reports it.
fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => integer_from_number(&n),
        Some(Value::String(s)) => integer_from_str(&s),
        Some(_) => Err(IntegerCastError::NotANumber),
    };
    parsed
        .map(Some)
        .map_err(|e| de::Error::custom(e.message()))
}

/// Rejects addresses whose domain is a single label (`a@localhost`) or ends in
/// something that cannot be a top-level domain.
fn validate_email_domain(email: &str) -> Result<(), validator::ValidationError> {
    let domain = email.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("");
    let mut labels = domain.split('.');
    let tld = labels.next_back().unwrap_or("");

    let has_parent = labels.next().is_some_and(|label| !label.is_empty());
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());
    if !(has_parent && tld_ok) {
        return Err(validator::ValidationError::new("email_domain"));
    }
    Ok(())
}
