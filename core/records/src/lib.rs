//! FILENAME: core/records/src/lib.rs
//! PURPOSE: Shared record, value and date types for the pivot subsystem.
//! CONTEXT: `pivot-engine` and `persistence` depend on this crate only for
//! these types; it holds no pipeline logic of its own.

pub mod date;
pub mod record;

pub use date::{
    bucket_date, bucket_label, bucket_value, financial_year, parse_date, parse_date_value,
    parse_period_label, week_number, Granularity,
};
pub use record::{
    coerce_number, format_number, get_key, get_key_any_case, get_key_ci, is_blank, label_or_blank,
    non_blank, parse_numeric_str, split_reference_path, value_to_label, Collection, Dataset,
    Record, BLANK_LABEL,
};
