use thiserror::Error;

/// Reasons a single raw record is rejected during normalization.
///
/// `record` carries the raw transaction id when one was present so that warnings
/// can be traced back to the source file.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Required field [{field}] is missing for record [{record}]")]
    MissingField {
        record: String,
        field: &'static str
    },
    #[error("Amount [{value}] is not a decimal for record [{record}]")]
    InvalidAmount {
        record: String,
        value: String
    },
    #[error("Amount [{value}] must be positive for record [{record}]")]
    NonPositiveAmount {
        record: String,
        value: String
    },
    #[error("Currency [{value}] is not a three-letter code for record [{record}]")]
    InvalidCurrency {
        record: String,
        value: String
    },
    #[error("Transaction type [{value}] is not recognised for record [{record}]")]
    InvalidTransactionType {
        record: String,
        value: String
    },
    #[error("Status [{value}] is not recognised for record [{record}]")]
    InvalidStatus {
        record: String,
        value: String
    },
    #[error("Date [{value}] is not a valid YYYY-MM-DD date for record [{record}]")]
    InvalidDate {
        record: String,
        value: String
    }
}

impl ValidationError {
    pub fn missing_field(record: &str, field: &'static str) -> Self {
        Self::MissingField { record: record.to_string(), field }
    }

    pub fn invalid_amount(record: &str, value: &str) -> Self {
        Self::InvalidAmount { record: record.to_string(), value: value.to_string() }
    }

    pub fn non_positive_amount(record: &str, value: &str) -> Self {
        Self::NonPositiveAmount { record: record.to_string(), value: value.to_string() }
    }

    pub fn invalid_currency(record: &str, value: &str) -> Self {
        Self::InvalidCurrency { record: record.to_string(), value: value.to_string() }
    }

    pub fn invalid_transaction_type(record: &str, value: &str) -> Self {
        Self::InvalidTransactionType { record: record.to_string(), value: value.to_string() }
    }

    pub fn invalid_status(record: &str, value: &str) -> Self {
        Self::InvalidStatus { record: record.to_string(), value: value.to_string() }
    }

    pub fn invalid_date(record: &str, value: &str) -> Self {
        Self::InvalidDate { record: record.to_string(), value: value.to_string() }
    }
}
