use std::fmt;
use std::hash::{Hash, Hasher};

pub const FIELD_COUNT: usize = 19;

/// Recognised columns of an extracted price-transparency file, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Code,
    CodeType,
    NegotiatedPrice,
    NegotiatedPercentage,
    GrossCharge,
    DiscountedCashPrice,
    MinPrice,
    MaxPrice,
    EstimatedAmount,
    InsurancePayerName,
    InsurancePlanName,
    NegotiatedMethodology,
    NegotiatedAlgorithm,
    Description,
    Setting,
    AdditionalNotes,
    Modifiers,
    DrugUnit,
    DrugType,
}

/// How the normalizer treats a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Monetary,
    FreeText,
    Modifiers,
    Plain,
}

pub const MONETARY_FIELDS: [Field; 7] = [
    Field::NegotiatedPrice,
    Field::NegotiatedPercentage,
    Field::GrossCharge,
    Field::DiscountedCashPrice,
    Field::MinPrice,
    Field::MaxPrice,
    Field::EstimatedAmount,
];

impl Field {
    pub const fn ordered() -> [Self; FIELD_COUNT] {
        [
            Self::Code,
            Self::CodeType,
            Self::NegotiatedPrice,
            Self::NegotiatedPercentage,
            Self::GrossCharge,
            Self::DiscountedCashPrice,
            Self::MinPrice,
            Self::MaxPrice,
            Self::EstimatedAmount,
            Self::InsurancePayerName,
            Self::InsurancePlanName,
            Self::NegotiatedMethodology,
            Self::NegotiatedAlgorithm,
            Self::Description,
            Self::Setting,
            Self::AdditionalNotes,
            Self::Modifiers,
            Self::DrugUnit,
            Self::DrugType,
        ]
    }

    pub const fn column(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::CodeType => "code type",
            Self::NegotiatedPrice => "negotiated price",
            Self::NegotiatedPercentage => "negotiated percentage",
            Self::GrossCharge => "gross charge",
            Self::DiscountedCashPrice => "discounted cash price",
            Self::MinPrice => "min price",
            Self::MaxPrice => "max price",
            Self::EstimatedAmount => "estimated amount",
            Self::InsurancePayerName => "insurance payer name",
            Self::InsurancePlanName => "insurance plan name",
            Self::NegotiatedMethodology => "negotiated methodology",
            Self::NegotiatedAlgorithm => "negotiated algorithm",
            Self::Description => "description",
            Self::Setting => "setting",
            Self::AdditionalNotes => "additional notes",
            Self::Modifiers => "modifiers",
            Self::DrugUnit => "drug unit",
            Self::DrugType => "drug type",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::NegotiatedPrice
            | Self::NegotiatedPercentage
            | Self::GrossCharge
            | Self::DiscountedCashPrice
            | Self::MinPrice
            | Self::MaxPrice
            | Self::EstimatedAmount => FieldKind::Monetary,
            Self::InsurancePayerName
            | Self::InsurancePlanName
            | Self::Description
            | Self::Setting
            | Self::NegotiatedAlgorithm
            | Self::NegotiatedMethodology => FieldKind::FreeText,
            Self::Modifiers => FieldKind::Modifiers,
            Self::Code
            | Self::CodeType
            | Self::AdditionalNotes
            | Self::DrugUnit
            | Self::DrugType => FieldKind::Plain,
        }
    }

    /// Columns the header must carry; the rest are read as entirely missing when absent.
    pub const fn is_required(self) -> bool {
        !matches!(self, Self::Setting | Self::Modifiers)
    }

    /// Looks up a header cell after canonicalisation (BOM stripped, trimmed, lowercased).
    pub fn from_column(name: &str) -> Option<Self> {
        let canonical = canonical_column(name);
        Self::ordered()
            .into_iter()
            .find(|field| field.column() == canonical)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

pub(crate) fn canonical_column(name: &str) -> String {
    name.replace('\u{feff}', "").trim().to_lowercase()
}

/// A single normalized cell.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Missing,
    Text(String),
    Amount(f64),
}

impl Value {
    /// Empty text counts as missing for every presence test.
    pub fn is_present(&self) -> bool {
        match self {
            Value::Missing => false,
            Value::Text(text) => !text.is_empty(),
            Value::Amount(_) => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    pub fn as_amount(&self) -> Option<f64> {
        match self {
            Value::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub(crate) fn to_cell(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Text(text) => text.clone(),
            Value::Amount(amount) => amount.to_string(),
        }
    }

    fn amount_bits(amount: f64) -> u64 {
        // 0.0 and -0.0 compare equal, so they must hash equal
        if amount == 0.0 {
            0
        } else {
            amount.to_bits()
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Missing, Value::Missing) => true,
            (Value::Text(left), Value::Text(right)) => left == right,
            (Value::Amount(left), Value::Amount(right)) => {
                Value::amount_bits(*left) == Value::amount_bits(*right)
            }
            _ => false,
        }
    }
}

// Amounts are always finite, so bitwise equality is a total equivalence.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Missing => {}
            Value::Text(text) => text.hash(state),
            Value::Amount(amount) => Value::amount_bits(*amount).hash(state),
        }
    }
}

/// One row of the file after normalization, keyed by [`Field`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    values: [Value; FIELD_COUNT],
    algorithm_format_invalid: bool,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            values: std::array::from_fn(|_| Value::Missing),
            algorithm_format_invalid: false,
        }
    }
}

impl Record {
    pub fn get(&self, field: Field) -> &Value {
        &self.values[field.index()]
    }

    pub fn set(&mut self, field: Field, value: Value) {
        self.values[field.index()] = value;
    }

    pub fn is_present(&self, field: Field) -> bool {
        self.get(field).is_present()
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field).as_text()
    }

    /// Working flag: the negotiated algorithm reads like a price rather than a description.
    pub fn algorithm_format_invalid(&self) -> bool {
        self.algorithm_format_invalid
    }

    pub(crate) fn set_algorithm_format_invalid(&mut self, invalid: bool) {
        self.algorithm_format_invalid = invalid;
    }

    /// Output cells in canonical column order; the working flag never leaves the record.
    pub fn to_row(&self) -> Vec<String> {
        self.values.iter().map(Value::to_cell).collect()
    }
}

pub(crate) fn header_row() -> Vec<&'static str> {
    Field::ordered().into_iter().map(Field::column).collect()
}
