use super::reader::RawRecord;
use super::schema::{Field, FieldKind, Record, Value};
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

/// Upstream "not provided" amount.
pub const PLACEHOLDER_AMOUNT: f64 = 999_999_999.0;

// Spellings that dataframe and spreadsheet exports write for an absent cell.
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "NULL", "NaN", "None", "nan", "null",
];

static INVALID_TOKEN: OnceLock<Regex> = OnceLock::new();
static PRICE_LIKE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a decimal amount")]
struct ValueCoercionError(String);

pub fn normalize_batch(batch: Vec<RawRecord>) -> Vec<Record> {
    batch.into_iter().map(normalize_record).collect()
}

pub fn normalize_record(mut raw: RawRecord) -> Record {
    let mut record = Record::default();

    for field in Field::ordered() {
        let value = match raw.take(field).filter(|cell| !is_missing_marker(cell)) {
            None => Value::Missing,
            Some(cell) => match field.kind() {
                FieldKind::Monetary => normalize_amount(field, &cell),
                FieldKind::FreeText => normalize_free_text(&cell),
                FieldKind::Modifiers => normalize_modifiers(&cell),
                FieldKind::Plain => normalize_plain(&cell),
            },
        };
        record.set(field, value);
    }

    let algorithm_invalid = record
        .text(Field::NegotiatedAlgorithm)
        .is_some_and(looks_like_price);
    record.set_algorithm_format_invalid(algorithm_invalid);

    record
}

fn is_missing_marker(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

fn normalize_amount(field: Field, raw: &str) -> Value {
    match parse_amount(raw) {
        // estimates may legitimately be zero, negative or the placeholder
        Ok(amount) if field == Field::EstimatedAmount => Value::Amount(amount),
        Ok(amount) if amount <= 0.0 || amount == PLACEHOLDER_AMOUNT => Value::Missing,
        Ok(amount) => Value::Amount(amount),
        Err(err) => {
            trace!(%field, %err, "amount treated as missing");
            Value::Missing
        }
    }
}

fn parse_amount(raw: &str) -> Result<f64, ValueCoercionError> {
    let stripped: String = raw
        .chars()
        .filter(|ch| !matches!(ch, '$' | '%' | '"' | ','))
        .collect();

    stripped
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| ValueCoercionError(raw.to_string()))
}

fn normalize_free_text(raw: &str) -> Value {
    if is_invalid_token(raw) {
        return Value::Missing;
    }
    non_empty(raw.trim().to_lowercase())
}

fn normalize_modifiers(raw: &str) -> Value {
    if is_invalid_token(raw) {
        return Value::Missing;
    }
    let canonical: String = raw
        .to_uppercase()
        .replace('|', ",")
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect();
    non_empty(canonical)
}

fn normalize_plain(raw: &str) -> Value {
    if is_invalid_token(raw) {
        return Value::Missing;
    }
    non_empty(raw.trim().to_string())
}

fn non_empty(value: String) -> Value {
    if value.is_empty() {
        Value::Missing
    } else {
        Value::Text(value)
    }
}

/// `n/a`, `na` and `not applicable`, in any case.
fn is_invalid_token(value: &str) -> bool {
    INVALID_TOKEN
        .get_or_init(|| {
            Regex::new(r"(?i)^(n/?a|not applicable)$").expect("invalid-token pattern compiles")
        })
        .is_match(value.trim())
}

/// Digits, currency and percent signs only: a price typed into the algorithm column.
fn looks_like_price(value: &str) -> bool {
    PRICE_LIKE
        .get_or_init(|| Regex::new(r"^[0-9$%\s]+$").expect("price pattern compiles"))
        .is_match(value)
}
