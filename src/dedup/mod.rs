mod engine;
#[cfg(test)]
mod tests;

pub use engine::{deduplicate, exclude_existing, remove_intra_batch_duplicates, DedupOutcome};
