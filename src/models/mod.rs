pub mod identifier;
pub mod outcome;
pub mod record;

pub use identifier::{
    dedupe_preserving_order, generate_identifiers, parse_identifier_list, Identifier,
    IdentifierRangeError,
};
pub use outcome::{
    AttemptFailure, AttemptResult, BatchResult, FetchAttempt, FetchOutcome, FetchReport,
};
pub use record::{StudentRecord, SEAT_NUMBER_COLUMN, STUDENT_NAME_COLUMN, TOTAL_MARKS_COLUMN};
