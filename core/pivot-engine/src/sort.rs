//! FILENAME: core/pivot-engine/src/sort.rs
//! Sorting of composite axis keys.
//!
//! Keys are decoded and compared position by position; the first position
//! that differs decides. `(blank)` sorts after every other label at its
//! position.

use std::cmp::Ordering;

use records::{parse_numeric_str, parse_period_label, BLANK_LABEL};

use crate::catalog::{FieldCatalog, FieldKind};
use crate::definition::PivotAxisField;
use crate::grouping::decode_key;
use crate::rules::FieldRules;

/// How labels at one key position compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisFieldType {
    /// Chronological, parseable before unparseable.
    Date,
    /// Numeric, parseable before unparseable.
    Number,
    /// Natural string order.
    Text,
    /// No catalog entry. Settled to `Number` or `Text` from the labels
    /// present, see `settle_field_types`.
    Inferred,
}

pub fn axis_field_types(fields: &[PivotAxisField], rules: &FieldRules, catalog: Option<&FieldCatalog>) -> Vec<AxisFieldType> {
    fields
        .iter()
        .map(|f| {
            if rules.is_date_field(&f.field) {
                return AxisFieldType::Date;
            }
            match catalog.and_then(|c| c.get(&f.field)) {
                Some(descriptor) if descriptor.kind == FieldKind::Value => AxisFieldType::Number,
                Some(_) => AxisFieldType::Text,
                None => AxisFieldType::Inferred,
            }
        })
        .collect()
}

/// Decides every `Inferred` position once from the keys being sorted: numeric
/// when each non-blank label at that position parses as a number, text
/// otherwise. Each position then compares one way for the whole sort.
pub fn settle_field_types(types: &[AxisFieldType], keys: &[String]) -> Vec<AxisFieldType> {
    if !types.contains(&AxisFieldType::Inferred) {
        return types.to_vec();
    }
    let decoded: Vec<_> = keys.iter().map(|k| decode_key(k)).collect();
    types
        .iter()
        .enumerate()
        .map(|(idx, &ty)| {
            if ty != AxisFieldType::Inferred {
                return ty;
            }
            let numeric = decoded
                .iter()
                .filter_map(|parts| parts.get(idx))
                .filter(|label| label.as_str() != BLANK_LABEL)
                .all(|label| parse_numeric_str(label).is_some());
            if numeric {
                AxisFieldType::Number
            } else {
                AxisFieldType::Text
            }
        })
        .collect()
}

// ============================================================================
// NATURAL ORDER
// ============================================================================

/// Splits off the leading run of digits or non-digits.
fn next_chunk(s: &str) -> (&str, &str) {
    let digits = s.starts_with(|c: char| c.is_ascii_digit());
    let end = s
        .find(|c: char| c.is_ascii_digit() != digits)
        .unwrap_or(s.len());
    s.split_at(end)
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
}

fn cmp_text_runs(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Case-insensitive, digit-aware comparison (`item2` < `Item10`). Ties are
/// broken byte-wise so the order is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut rest_a, mut rest_b) = (a, b);
    loop {
        match (rest_a.is_empty(), rest_b.is_empty()) {
            (true, true) => break,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        let (chunk_a, tail_a) = next_chunk(rest_a);
        let (chunk_b, tail_b) = next_chunk(rest_b);
        let a_digits = chunk_a.starts_with(|c: char| c.is_ascii_digit());
        let b_digits = chunk_b.starts_with(|c: char| c.is_ascii_digit());

        let ord = if a_digits && b_digits {
            cmp_digit_runs(chunk_a, chunk_b)
        } else {
            cmp_text_runs(chunk_a, chunk_b)
        };
        if ord != Ordering::Equal {
            return ord;
        }
        rest_a = tail_a;
        rest_b = tail_b;
    }
    a.cmp(b)
}

// ============================================================================
// LABEL AND KEY COMPARISON
// ============================================================================

fn parsed_first<T, F>(a: Option<T>, b: Option<T>, cmp: F) -> Option<Ordering>
where
    F: FnOnce(T, T) -> Ordering,
{
    match (a, b) {
        (Some(x), Some(y)) => Some(cmp(x, y)),
        (Some(_), None) => Some(Ordering::Less),
        (None, Some(_)) => Some(Ordering::Greater),
        (None, None) => None,
    }
}

fn cmp_numbers(x: f64, y: f64) -> Ordering {
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

/// Compares two bucket labels at one key position.
pub fn compare_labels(a: &str, b: &str, field_type: AxisFieldType) -> Ordering {
    match (a == BLANK_LABEL, b == BLANK_LABEL) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let typed = match field_type {
        AxisFieldType::Date => parsed_first(parse_period_label(a), parse_period_label(b), |x, y| x.cmp(&y)),
        AxisFieldType::Number | AxisFieldType::Inferred => {
            parsed_first(parse_numeric_str(a), parse_numeric_str(b), cmp_numbers)
        }
        AxisFieldType::Text => None,
    };

    match typed {
        Some(Ordering::Equal) | None => natural_cmp(a, b),
        Some(ord) => ord,
    }
}

fn compare_parts(a: &str, b: &str, type_at: impl Fn(usize) -> AxisFieldType) -> Ordering {
    let parts_a = decode_key(a);
    let parts_b = decode_key(b);
    for (idx, (x, y)) in parts_a.iter().zip(parts_b.iter()).enumerate() {
        let ord = compare_labels(x, y, type_at(idx));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    parts_a.len().cmp(&parts_b.len()).then_with(|| a.cmp(b))
}

/// Row-key order: typed per position.
pub fn compare_row_keys(a: &str, b: &str, types: &[AxisFieldType]) -> Ordering {
    compare_parts(a, b, |idx| types.get(idx).copied().unwrap_or(AxisFieldType::Inferred))
}

/// Column-key order: natural per position, blanks last.
pub fn compare_col_keys(a: &str, b: &str) -> Ordering {
    compare_parts(a, b, |_| AxisFieldType::Text)
}
