use garde::Validate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// A stored catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned identifier, never reused
    pub id: i64,
    pub title: String,
    pub author: String,
    /// 13 ASCII digits
    pub isbn: String,
    /// Written to JSON as a number
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub genre: String,
}

/// The five mutable fields of a [`Book`], already validated.
///
/// Only [`BookPayload::into_record`] builds one, so anything handed to the
/// store satisfies every field constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) isbn: String,
    pub(crate) price: Decimal,
    pub(crate) genre: String,
}

impl NewBook {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    /// Attach a store id.
    pub fn with_id(self, id: i64) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            price: self.price,
            genre: self.genre,
        }
    }
}

/// Raw request body for create and update.
///
/// Absent and `null` fields deserialize to their zero value so that a
/// missing field is reported as a violation rather than a parse failure.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct BookPayload {
    /// Ignored on create; on update a nonzero value must match the path id.
    #[garde(skip)]
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[garde(custom(required), length(chars, max = 200))]
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[garde(custom(required), length(chars, max = 150))]
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
    #[garde(custom(isbn13))]
    #[serde(deserialize_with = "null_as_default")]
    pub isbn: String,
    #[garde(custom(positive))]
    #[serde(deserialize_with = "null_as_default")]
    pub price: Decimal,
    #[garde(custom(required), length(chars, max = 50))]
    #[serde(deserialize_with = "null_as_default")]
    pub genre: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl BookPayload {
    /// Check every field constraint and, if all hold, take the fields as-is.
    pub fn into_record(self) -> Result<NewBook, ValidationError> {
        self.validate()?;
        Ok(NewBook {
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            price: self.price,
            genre: self.genre,
        })
    }
}

fn required(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("is required"));
    }
    Ok(())
}

/// A blank isbn is only reported as missing, not also as malformed.
fn isbn13(value: &str, ctx: &()) -> garde::Result {
    required(value, ctx)?;
    if value.len() != 13 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(garde::Error::new("must be exactly 13 digits"));
    }
    Ok(())
}

fn positive(value: &Decimal, _ctx: &()) -> garde::Result {
    if *value <= Decimal::ZERO {
        return Err(garde::Error::new("must be greater than 0"));
    }
    Ok(())
}

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub error: String,
}

/// Every constraint a payload failed, in field order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("book failed validation on {} constraint(s)", .violations.len())]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl From<garde::Report> for ValidationError {
    fn from(report: garde::Report) -> Self {
        let violations = report
            .iter()
            .map(|(path, error)| Violation {
                field: path.to_string(),
                error: error.to_string(),
            })
            .collect();
        Self { violations }
    }
}
