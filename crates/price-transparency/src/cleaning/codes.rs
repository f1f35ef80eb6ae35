use super::schema::{Field, Record, Value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

static CODE_PATTERNS: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();

fn code_patterns() -> &'static HashMap<&'static str, Regex> {
    CODE_PATTERNS.get_or_init(|| {
        const PATTERNS: &[(&str, &str)] = &[
            ("CPT", r"^[0-9]{5}$"),
            ("HCPCS", r"^([0-9]{5}|[A-V][0-9]{4})$"),
            ("NDC", r"^[0-9]{10,11}$"),
            ("DRG", r"^[0-9]{3}$"),
            ("CDT", r"^D[0-9]{4}$"),
            ("APC", r"^[0-9]{4}$"),
            ("ICD", r"^.{3,7}$"),
        ];

        PATTERNS
            .iter()
            .map(|(code_type, pattern)| {
                let regex = Regex::new(pattern).expect("code pattern compiles");
                (*code_type, regex)
            })
            .collect()
    })
}

/// Uppercases the code type in place and reports whether the record survives.
///
/// Records without a code are always kept; a code with no code type, an unknown
/// code type, or a malformed code is dropped.
pub fn canonicalize_and_check(record: &mut Record) -> bool {
    if let Some(code_type) = record.text(Field::CodeType).map(str::to_uppercase) {
        record.set(Field::CodeType, Value::Text(code_type));
    }

    let Some(code) = record.text(Field::Code) else {
        return true;
    };

    record
        .text(Field::CodeType)
        .and_then(|code_type| code_patterns().get(code_type))
        .is_some_and(|pattern| pattern.is_match(code))
}

/// Drops structurally invalid (code, code type) rows and returns how many went.
pub fn retain_valid_codes(records: &mut Vec<Record>) -> usize {
    let before = records.len();
    records.retain_mut(canonicalize_and_check);
    before - records.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: Option<&str>, code_type: Option<&str>) -> Record {
        let mut record = Record::default();
        if let Some(code) = code {
            record.set(Field::Code, Value::Text(code.into()));
        }
        if let Some(code_type) = code_type {
            record.set(Field::CodeType, Value::Text(code_type.into()));
        }
        record
    }

    fn accepted(code: &str, code_type: &str) -> bool {
        canonicalize_and_check(&mut record(Some(code), Some(code_type)))
    }

    #[test]
    fn recognises_each_code_family() {
        assert!(accepted("99213", "cpt"));
        assert!(accepted("99213", "HCPCS"));
        assert!(accepted("J1100", "hcpcs"));
        assert!(accepted("1234567890", "NDC"));
        assert!(accepted("12345678901", "NDC"));
        assert!(accepted("470", "DRG"));
        assert!(accepted("D0120", "CDT"));
        assert!(accepted("5012", "APC"));
        assert!(accepted("E11.9", "ICD"));
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(!accepted("9921", "CPT"));
        assert!(!accepted("W1100", "HCPCS"));
        assert!(!accepted("123456789", "NDC"));
        assert!(!accepted("4700", "DRG"));
        assert!(!accepted("d0120", "CDT"));
        assert!(!accepted("501", "APC"));
        assert!(!accepted("E11.9999", "ICD"));
        assert!(!accepted("99213", "REV"));
    }

    #[test]
    fn missing_code_is_kept_and_missing_code_type_is_dropped() {
        assert!(canonicalize_and_check(&mut record(None, Some("cpt"))));
        assert!(canonicalize_and_check(&mut record(None, None)));
        assert!(!canonicalize_and_check(&mut record(Some("99213"), None)));
    }

    #[test]
    fn retain_counts_dropped_rows_and_uppercases_code_type() {
        let mut records = vec![
            record(Some("99213"), Some("cpt")),
            record(Some("12"), Some("cpt")),
            record(None, Some("ndc")),
        ];
        assert_eq!(retain_valid_codes(&mut records), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text(Field::CodeType), Some("CPT"));
        assert_eq!(records[1].text(Field::CodeType), Some("NDC"));
    }
}
