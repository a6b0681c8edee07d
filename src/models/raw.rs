use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::errors::ValidationError;
use crate::models::{CanonicalTransaction, TransactionStatus, TransactionType};

const UNKNOWN_RECORD: &str = "<unknown>";
const UNKNOWN_CONTEXT: &str = "unknown";
const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_LENGTH: usize = 10;

/// A record as it appeared in a source file, tagged by the file's shape.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Nested(NestedRecord),
    Flat(FlatRecord)
}

impl RawRecord {
    /// Validates the record and maps it into the canonical shape.
    ///
    /// # Errors
    /// Returns the first `ValidationError` encountered; the record should then be dropped.
    pub fn normalize(self) -> Result<CanonicalTransaction, ValidationError> {
        match self {
            RawRecord::Nested(record) => record.normalize(),
            RawRecord::Flat(record) => record.normalize()
        }
    }
}

/// One element of a JSON array file. Customer and context attributes live in sub-objects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedRecord {
    pub transaction_id: Option<String>,
    /// JSON sources emit amounts as numbers, occasionally as strings.
    pub amount: Option<Value>,
    pub currency: Option<String>,
    pub transaction_type: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub customer: NestedCustomer,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: NestedMetadata
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedCustomer {
    pub customer_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedMetadata {
    pub ip_address: Option<String>,
    pub device: Option<String>,
    pub location: Option<String>
}

/// One row of a CSV file with a header line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlatRecord {
    pub transaction_id: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub transaction_type: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub ip_address: Option<String>,
    pub device: Option<String>,
    pub location: Option<String>
}

impl NestedRecord {
    fn normalize(self) -> Result<CanonicalTransaction, ValidationError> {
        let record = record_label(self.transaction_id.as_deref());

        let amount = match &self.amount {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            Some(other) => return Err(ValidationError::invalid_amount(&record, &other.to_string()))
        };

        RecordFields {
            transaction_id: self.transaction_id.as_deref(),
            amount: amount.as_deref(),
            currency: self.currency.as_deref(),
            transaction_type: self.transaction_type.as_deref(),
            status: self.status.as_deref(),
            date: self.date.as_deref(),
            customer_id: self.customer.customer_id.as_deref(),
            customer_name: self.customer.name.as_deref(),
            customer_email: self.customer.email.as_deref(),
            ip_address: self.metadata.ip_address.as_deref(),
            device: self.metadata.device.as_deref(),
            location: self.metadata.location.as_deref()
        }.validate()
    }
}

impl FlatRecord {
    fn normalize(self) -> Result<CanonicalTransaction, ValidationError> {
        RecordFields {
            transaction_id: self.transaction_id.as_deref(),
            amount: self.amount.as_deref(),
            currency: self.currency.as_deref(),
            transaction_type: self.transaction_type.as_deref(),
            status: self.status.as_deref(),
            date: self.date.as_deref(),
            customer_id: self.customer_id.as_deref(),
            customer_name: self.customer_name.as_deref(),
            customer_email: self.customer_email.as_deref(),
            ip_address: self.ip_address.as_deref(),
            device: self.device.as_deref(),
            location: self.location.as_deref()
        }.validate()
    }
}

/// Borrowed view shared by both shapes so validation rules exist exactly once.
struct RecordFields<'a> {
    transaction_id: Option<&'a str>,
    amount: Option<&'a str>,
    currency: Option<&'a str>,
    transaction_type: Option<&'a str>,
    status: Option<&'a str>,
    date: Option<&'a str>,
    customer_id: Option<&'a str>,
    customer_name: Option<&'a str>,
    customer_email: Option<&'a str>,
    ip_address: Option<&'a str>,
    device: Option<&'a str>,
    location: Option<&'a str>
}

impl RecordFields<'_> {
    fn validate(self) -> Result<CanonicalTransaction, ValidationError> {
        let record = record_label(self.transaction_id);

        let transaction_id = required(&record, "transaction_id", self.transaction_id)?;
        let amount = parse_amount(&record, required(&record, "amount", self.amount)?)?;
        let currency = parse_currency(&record, required(&record, "currency", self.currency)?)?;

        let raw_type = required(&record, "transaction_type", self.transaction_type)?;
        let transaction_type = TransactionType::from_str(&raw_type)
            .map_err(|_| ValidationError::invalid_transaction_type(&record, &raw_type))?;

        let raw_status = required(&record, "status", self.status)?;
        let status = TransactionStatus::from_str(&raw_status)
            .map_err(|_| ValidationError::invalid_status(&record, &raw_status))?;

        let raw_date = required(&record, "date", self.date)?;
        let date = parse_date(&record, &raw_date)?;

        Ok(CanonicalTransaction {
            transaction_id,
            amount,
            currency,
            transaction_type,
            status,
            date,
            customer_id: required(&record, "customer_id", self.customer_id)?,
            customer_name: required(&record, "customer_name", self.customer_name)?,
            customer_email: required(&record, "customer_email", self.customer_email)?,
            ip_address: optional(self.ip_address),
            device: optional(self.device),
            location: optional(self.location)
        })
    }
}

fn record_label(transaction_id: Option<&str>) -> String {
    match transaction_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => UNKNOWN_RECORD.to_string()
    }
}

fn required(record: &str, field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ValidationError::missing_field(record, field))
    }
}

fn optional(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => UNKNOWN_CONTEXT.to_string()
    }
}

fn parse_amount(record: &str, raw: String) -> Result<Decimal, ValidationError> {
    let amount = Decimal::from_str(&raw)
        .map_err(|_| ValidationError::invalid_amount(record, &raw))?;

    if amount <= Decimal::ZERO {
        return Err(ValidationError::non_positive_amount(record, &raw));
    }

    Ok(amount)
}

/// Strict `YYYY-MM-DD`. chrono's `%Y` also takes signed and five-digit years, which
/// would break the lexical date order the store relies on.
fn parse_date(record: &str, raw: &str) -> Result<NaiveDate, ValidationError> {
    let date = NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .filter(|date| raw.len() == DATE_LENGTH && (0..=9999).contains(&date.year()))
        .ok_or_else(|| ValidationError::invalid_date(record, raw))?;

    Ok(date)
}

/// An explicit `null` sub-object reads the same as a missing one.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_currency(record: &str, raw: String) -> Result<String, ValidationError> {
    if raw.len() != 3 || !raw.chars().all(|character| character.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid_currency(record, &raw));
    }

    Ok(raw.to_ascii_uppercase())
}
