mod date_range;

pub use date_range::DateRange;

pub type TransactionId = String;
