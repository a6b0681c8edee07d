use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{TransactionStatus, TransactionType};
use crate::types::TransactionId;

/// The single normalized shape every source record is mapped into.
///
/// Rows of this type are what the store persists and what the pagination
/// engine serves. Once inserted, a row is never modified.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    /// Globally unique identifier and primary key.
    pub transaction_id: TransactionId,
    /// Strictly positive amount.
    pub amount: Decimal,
    /// Three-letter upper-case currency code.
    pub currency: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub date: NaiveDate,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub ip_address: String,
    pub device: String,
    pub location: String
}

impl CanonicalTransaction {
    pub fn sort_key(&self) -> SortKey {
        SortKey {
            date: self.date,
            transaction_id: self.transaction_id.clone()
        }
    }
}

/// Position of a row in the total order `(date, transaction_id)`.
///
/// Field order matters: the derived `Ord` compares `date` first.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub date: NaiveDate,
    pub transaction_id: TransactionId
}

impl SortKey {
    pub fn new(date: NaiveDate, transaction_id: impl Into<TransactionId>) -> Self {
        Self {
            date,
            transaction_id: transaction_id.into()
        }
    }
}
