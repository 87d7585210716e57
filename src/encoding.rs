//! Fixed categorical lookup tables.
//!
//! The codes are the ones the classifier was trained on. Lookups are
//! exact-match on the label; `"male"` is not `"Male"`.

use crate::error::EncodingError;

/// A fixed mapping from human-readable labels to integer codes.
#[derive(Debug)]
pub struct EncodingTable {
    field: &'static str,
    entries: &'static [(&'static str, i32)],
}

impl EncodingTable {
    const fn new(field: &'static str, entries: &'static [(&'static str, i32)]) -> Self {
        Self { field, entries }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Code for `label`, or `None` when the label is unknown.
    pub fn code(&self, label: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, code)| *code)
    }

    pub fn encode(&self, label: &str) -> Result<i32, EncodingError> {
        self.code(label).ok_or_else(|| EncodingError::UnknownLabel {
            field: self.field,
            label: label.to_string(),
        })
    }

    /// Whether `code` is one of the values this table produces.
    pub fn has_code(&self, code: i64) -> bool {
        self.entries.iter().any(|(_, known)| i64::from(*known) == code)
    }

    /// Labels in declaration order, used to render select options.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(label, _)| *label)
    }

    pub fn entries(&self) -> &'static [(&'static str, i32)] {
        self.entries
    }
}

pub static GENDER: EncodingTable =
    EncodingTable::new("gender", &[("Male", 1), ("Female", 0), ("Other", 2)]);
pub static YES_NO: EncodingTable = EncodingTable::new(
    "yes/no",
    &[("Tidak", 0), ("Ya", 1), ("No", 0), ("Yes", 1)]
);
pub static WORK_TYPE: EncodingTable = EncodingTable::new(
    "work_type",
    &[
        ("Private", 2),
        ("Self-employed", 3),
        ("Govt_job", 0),
        ("children", 1),
        ("Never_worked", 4),
    ]
);
pub static RESIDENCE: EncodingTable =
    EncodingTable::new("Residence_type", &[("Urban", 1), ("Rural", 0)]);
pub static SMOKING: EncodingTable = EncodingTable::new(
    "smoking_status",
    &[
        ("formerly smoked", 1),
        ("never smoked", 2),
        ("smokes", 3),
        ("Unknown", 0),
    ]
);

/// Table applied to each categorical column of an uploaded table.
pub fn table_for_column(column: &str) -> Option<&'static EncodingTable> {
    match column {
        "gender" => Some(&GENDER),
        "hypertension" | "heart_disease" | "ever_married" => Some(&YES_NO),
        "work_type" => Some(&WORK_TYPE),
        "Residence_type" => Some(&RESIDENCE),
        "smoking_status" => Some(&SMOKING),
        _ => None,
    }
}
