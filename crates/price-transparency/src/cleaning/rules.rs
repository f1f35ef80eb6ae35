use super::schema::{Field, Record, MONETARY_FIELDS};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

pub const RULE_COUNT: usize = 10;

/// Cross-field consistency rules applied to every record that survives code validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    /// A negotiated rate without payer, plan and methodology.
    RateWithoutPayerContext,
    /// A monetary amount without both code and code type.
    AmountWithoutCode,
    /// Exactly one of code and code type.
    UnpairedCode,
    /// Methodology "other" without an explanatory note.
    OtherMethodologyWithoutNotes,
    /// A described item with no charge, rate or algorithm.
    DescriptionWithoutCharge,
    /// A negotiated price without both min and max price.
    NegotiatedPriceWithoutRange,
    /// A percentage or algorithm rate without an estimated amount.
    RateWithoutEstimate,
    /// An NDC code without both drug unit and drug type.
    DrugCodeWithoutDrugDetails,
    /// Modifiers with nothing they could modify.
    ModifiersWithoutContext,
    /// Exactly one of drug unit and drug type.
    UnpairedDrugDetails,
}

impl Rule {
    pub const fn ordered() -> [Self; RULE_COUNT] {
        [
            Self::RateWithoutPayerContext,
            Self::AmountWithoutCode,
            Self::UnpairedCode,
            Self::OtherMethodologyWithoutNotes,
            Self::DescriptionWithoutCharge,
            Self::NegotiatedPriceWithoutRange,
            Self::RateWithoutEstimate,
            Self::DrugCodeWithoutDrugDetails,
            Self::ModifiersWithoutContext,
            Self::UnpairedDrugDetails,
        ]
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::RateWithoutPayerContext => "rule_1",
            Self::AmountWithoutCode => "rule_2",
            Self::UnpairedCode => "rule_3",
            Self::OtherMethodologyWithoutNotes => "rule_4",
            Self::DescriptionWithoutCharge => "rule_5",
            Self::NegotiatedPriceWithoutRange => "rule_6",
            Self::RateWithoutEstimate => "rule_7",
            Self::DrugCodeWithoutDrugDetails => "rule_8",
            Self::ModifiersWithoutContext => "rule_9",
            Self::UnpairedDrugDetails => "rule_10",
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }

    pub fn is_violated_by(self, record: &Record) -> bool {
        let present = |field: Field| record.is_present(field);
        let any = |fields: &[Field]| fields.iter().any(|field| present(*field));
        let all = |fields: &[Field]| fields.iter().all(|field| present(*field));

        match self {
            Self::RateWithoutPayerContext => {
                any(&[
                    Field::NegotiatedPrice,
                    Field::NegotiatedPercentage,
                    Field::GrossCharge,
                ]) && !all(&[
                    Field::InsurancePayerName,
                    Field::InsurancePlanName,
                    Field::NegotiatedMethodology,
                ])
            }
            Self::AmountWithoutCode => {
                any(&MONETARY_FIELDS) && !all(&[Field::Code, Field::CodeType])
            }
            Self::UnpairedCode => present(Field::Code) != present(Field::CodeType),
            Self::OtherMethodologyWithoutNotes => {
                record
                    .text(Field::NegotiatedMethodology)
                    .is_some_and(|methodology| methodology.eq_ignore_ascii_case("other"))
                    && !present(Field::AdditionalNotes)
            }
            Self::DescriptionWithoutCharge => {
                present(Field::Description)
                    && !any(&[
                        Field::GrossCharge,
                        Field::DiscountedCashPrice,
                        Field::NegotiatedPrice,
                        Field::NegotiatedPercentage,
                        Field::NegotiatedAlgorithm,
                    ])
            }
            Self::NegotiatedPriceWithoutRange => {
                present(Field::NegotiatedPrice) && !all(&[Field::MinPrice, Field::MaxPrice])
            }
            Self::RateWithoutEstimate => {
                !present(Field::NegotiatedPrice)
                    && any(&[Field::NegotiatedPercentage, Field::NegotiatedAlgorithm])
                    && !present(Field::EstimatedAmount)
            }
            Self::DrugCodeWithoutDrugDetails => {
                record.text(Field::CodeType) == Some("NDC")
                    && !all(&[Field::DrugUnit, Field::DrugType])
            }
            Self::ModifiersWithoutContext => {
                present(Field::Modifiers)
                    && !present(Field::Description)
                    && !any(&[
                        Field::NegotiatedPrice,
                        Field::NegotiatedPercentage,
                        Field::NegotiatedAlgorithm,
                        Field::AdditionalNotes,
                    ])
            }
            Self::UnpairedDrugDetails => present(Field::DrugUnit) != present(Field::DrugType),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Set of rules a single record failed. Displays as a comma-joined id list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RuleSet(u16);

impl RuleSet {
    pub fn insert(&mut self, rule: Rule) {
        self.0 |= rule.bit();
    }

    pub fn contains(&self, rule: Rule) -> bool {
        self.0 & rule.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Rule> + '_ {
        Rule::ordered()
            .into_iter()
            .filter(move |rule| self.contains(*rule))
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut set = RuleSet::default();
        for rule in iter {
            set.insert(rule);
        }
        set
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, rule) in self.iter().enumerate() {
            if position > 0 {
                f.write_str(",")?;
            }
            f.write_str(rule.id())?;
        }
        Ok(())
    }
}

/// Evaluates all ten rules independently; a record may fail several at once.
pub fn evaluate(record: &Record) -> RuleSet {
    Rule::ordered()
        .into_iter()
        .filter(|rule| rule.is_violated_by(record))
        .collect()
}

/// Per-rule violation tallies. Every rule id is always present, even at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleCounts([u64; RULE_COUNT]);

impl RuleCounts {
    pub fn get(&self, rule: Rule) -> u64 {
        self.0[rule as usize]
    }

    pub fn record(&mut self, violations: RuleSet) {
        for rule in violations.iter() {
            self.0[rule as usize] += 1;
        }
    }

    pub fn merge(&mut self, other: &RuleCounts) {
        for (total, count) in self.0.iter_mut().zip(other.0) {
            *total += count;
        }
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rule, u64)> + '_ {
        Rule::ordered()
            .into_iter()
            .map(move |rule| (rule, self.get(rule)))
    }
}

impl Serialize for RuleCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(RULE_COUNT))?;
        for (rule, count) in self.iter() {
            map.serialize_entry(rule.id(), &count)?;
        }
        map.end()
    }
}

impl fmt::Display for RuleCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, (rule, count)) in self.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{rule}: {count}")?;
        }
        Ok(())
    }
}
