use super::rules::{evaluate, RuleCounts, RuleSet};
use super::schema::Record;

/// A record routed to the violations report together with the rules it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolatingRecord {
    pub record: Record,
    pub rules: RuleSet,
}

impl ViolatingRecord {
    pub fn to_row(&self) -> Vec<String> {
        let mut row = self.record.to_row();
        row.push(self.rules.to_string());
        row
    }
}

/// One batch split into its clean and violating subsets.
#[derive(Debug, Default)]
pub struct Partition {
    pub clean: Vec<Record>,
    pub violations: Vec<ViolatingRecord>,
    pub rule_counts: RuleCounts,
    /// Price-like negotiated algorithms, counted over clean records only.
    pub algorithm_format_issues: u64,
}

/// Tags every record with its violated rules and splits the batch, keeping arrival order.
pub fn partition(records: Vec<Record>) -> Partition {
    let mut partition = Partition::default();

    for record in records {
        let rules = evaluate(&record);
        if rules.is_empty() {
            if record.algorithm_format_invalid() {
                partition.algorithm_format_issues += 1;
            }
            partition.clean.push(record);
        } else {
            partition.rule_counts.record(rules);
            partition.violations.push(ViolatingRecord { record, rules });
        }
    }

    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::normalizer::normalize_record;
    use crate::cleaning::reader::RawRecord;
    use crate::cleaning::rules::Rule;
    use crate::cleaning::schema::Field;

    fn clean_line(algorithm: &str) -> Record {
        normalize_record(
            RawRecord::default()
                .with(Field::Code, "99213")
                .with(Field::CodeType, "CPT")
                .with(Field::NegotiatedAlgorithm, algorithm)
                .with(Field::EstimatedAmount, "140")
                .with(Field::Description, "office visit"),
        )
    }

    fn ndc_line_missing_unit() -> Record {
        normalize_record(
            RawRecord::default()
                .with(Field::Code, "12345678901")
                .with(Field::CodeType, "NDC")
                .with(Field::NegotiatedAlgorithm, "$45")
                .with(Field::EstimatedAmount, "40")
                .with(Field::DrugType, "tablet"),
        )
    }

    #[test]
    fn splits_clean_and_violating_records_in_order() {
        let result = partition(vec![
            clean_line("150% of medicare"),
            ndc_line_missing_unit(),
            clean_line("per diem"),
        ]);

        assert_eq!(result.clean.len(), 2);
        assert_eq!(
            result.clean[1].text(Field::NegotiatedAlgorithm),
            Some("per diem")
        );
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rules.to_string(), "rule_8,rule_10");
        assert_eq!(result.rule_counts.get(Rule::DrugCodeWithoutDrugDetails), 1);
        assert_eq!(result.rule_counts.get(Rule::UnpairedDrugDetails), 1);
        assert_eq!(result.rule_counts.total(), 2);
    }

    #[test]
    fn algorithm_format_issues_only_count_clean_records() {
        let result = partition(vec![clean_line("$150"), ndc_line_missing_unit()]);
        assert!(result.violations[0].record.algorithm_format_invalid());
        assert_eq!(result.algorithm_format_issues, 1);
    }

    #[test]
    fn violating_rows_carry_a_trailing_rules_column() {
        let result = partition(vec![ndc_line_missing_unit()]);
        let row = result.violations[0].to_row();
        assert_eq!(row.last().map(String::as_str), Some("rule_8,rule_10"));
        assert_eq!(row.len(), crate::cleaning::schema::FIELD_COUNT + 1);
    }
}
