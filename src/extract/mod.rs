// casesync/src/extract/mod.rs
pub(crate) mod logic;

pub use logic::{extract, CaseSource, ExtractionResult, PgCaseSource};
