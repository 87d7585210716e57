use polars::prelude::*;
use serde::Deserialize;

use crate::encoding::{GENDER, RESIDENCE, SMOKING, WORK_TYPE, YES_NO};
use crate::error::{EncodingError, ValidationError};

/// Feature columns in the order the classifier was trained on.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "id",
    "gender",
    "age",
    "hypertension",
    "heart_disease",
    "ever_married",
    "work_type",
    "Residence_type",
    "avg_glucose_level",
    "bmi",
    "smoking_status",
];

pub const CATEGORICAL_COLUMNS: [&str; 7] = [
    "gender",
    "hypertension",
    "heart_disease",
    "ever_married",
    "work_type",
    "Residence_type",
    "smoking_status",
];

pub const NUMERIC_COLUMNS: [&str; 3] = ["age", "avg_glucose_level", "bmi"];

pub const ID_COLUMN: &str = "id";
pub const LABEL_COLUMN: &str = "stroke";

/// Column types of an upload once its categorical columns are encoded.
pub fn raw_schema() -> Schema {
    Schema::from_iter(vec![
        Field::new(ID_COLUMN, DataType::Int64),
        Field::new("gender", DataType::Int32),
        Field::new("age", DataType::Float64),
        Field::new("hypertension", DataType::Int32),
        Field::new("heart_disease", DataType::Int32),
        Field::new("ever_married", DataType::Int32),
        Field::new("work_type", DataType::Int32),
        Field::new("Residence_type", DataType::Int32),
        Field::new("avg_glucose_level", DataType::Float64),
        Field::new("bmi", DataType::Float64),
        Field::new("smoking_status", DataType::Int32),
        Field::new(LABEL_COLUMN, DataType::Int32),
    ])
}

pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 100;

/// One patient as entered in the form, with categorical fields still as labels.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    pub gender: String,
    pub age: i64,
    pub hypertension: String,
    pub heart_disease: String,
    pub ever_married: String,
    pub work_type: String,
    pub residence_type: String,
    pub avg_glucose_level: f64,
    pub bmi: f64,
    pub smoking_status: String,
}

impl PatientRecord {
    /// Encode every categorical field. Any unknown label fails the record.
    pub fn encode(&self) -> Result<EncodedFeatureRow, EncodingError> {
        Ok(EncodedFeatureRow {
            id: 0,
            gender: Some(GENDER.encode(&self.gender)?),
            age: Some(self.age as f64),
            hypertension: Some(YES_NO.encode(&self.hypertension)?),
            heart_disease: Some(YES_NO.encode(&self.heart_disease)?),
            ever_married: Some(YES_NO.encode(&self.ever_married)?),
            work_type: Some(WORK_TYPE.encode(&self.work_type)?),
            residence_type: Some(RESIDENCE.encode(&self.residence_type)?),
            avg_glucose_level: Some(self.avg_glucose_level),
            bmi: Some(self.bmi),
            smoking_status: Some(SMOKING.encode(&self.smoking_status)?),
        })
    }
}

/// Raw form submission. Every field arrives as text and is checked by
/// [`PatientForm::validate`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatientForm {
    pub gender: String,
    pub age: String,
    pub hypertension: String,
    pub heart_disease: String,
    pub ever_married: String,
    pub work_type: String,
    #[serde(rename = "Residence_type")]
    pub residence_type: String,
    pub avg_glucose_level: String,
    pub bmi: String,
    pub smoking_status: String,
}

impl Default for PatientForm {
    fn default() -> Self {
        Self {
            gender: "Male".to_string(),
            age: "30".to_string(),
            hypertension: "Tidak".to_string(),
            heart_disease: "Tidak".to_string(),
            ever_married: "No".to_string(),
            work_type: "Private".to_string(),
            residence_type: "Urban".to_string(),
            avg_glucose_level: "90.0".to_string(),
            bmi: "22.0".to_string(),
            smoking_status: "formerly smoked".to_string(),
        }
    }
}

impl PatientForm {
    pub fn validate(&self) -> Result<PatientRecord, ValidationError> {
        let age = self
            .age
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::NotANumber {
                field: "age",
                value: self.age.clone(),
            })?;
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Err(ValidationError::AgeOutOfRange { age });
        }

        let record = PatientRecord {
            gender: self.gender.clone(),
            age,
            hypertension: self.hypertension.clone(),
            heart_disease: self.heart_disease.clone(),
            ever_married: self.ever_married.clone(),
            work_type: self.work_type.clone(),
            residence_type: self.residence_type.clone(),
            avg_glucose_level: non_negative("avg_glucose_level", &self.avg_glucose_level)?,
            bmi: non_negative("bmi", &self.bmi)?,
            smoking_status: self.smoking_status.clone(),
        };
        // resolve labels now so a bad option is reported before predicting
        record.encode()?;
        Ok(record)
    }
}

fn non_negative(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::NotANumber {
            field,
            value: raw.to_string(),
        })?;
    if !value.is_finite() {
        return Err(ValidationError::NotANumber {
            field,
            value: raw.to_string(),
        });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(value)
}

/// A record with categorical fields replaced by their codes.
///
/// Cells are optional because an uploaded row may carry a label that no
/// table knows; such a cell reaches the classifier as `NaN`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedFeatureRow {
    pub id: i64,
    pub gender: Option<i32>,
    pub age: Option<f64>,
    pub hypertension: Option<i32>,
    pub heart_disease: Option<i32>,
    pub ever_married: Option<i32>,
    pub work_type: Option<i32>,
    pub residence_type: Option<i32>,
    pub avg_glucose_level: Option<f64>,
    pub bmi: Option<f64>,
    pub smoking_status: Option<i32>,
}

impl EncodedFeatureRow {
    /// Build a row from cells laid out as [`FEATURE_COLUMNS`].
    pub fn from_cells(id: i64, cells: &[Option<f64>; 10]) -> Self {
        let code = |v: Option<f64>| v.map(|x| x as i32);
        Self {
            id,
            gender: code(cells[0]),
            age: cells[1],
            hypertension: code(cells[2]),
            heart_disease: code(cells[3]),
            ever_married: code(cells[4]),
            work_type: code(cells[5]),
            residence_type: code(cells[6]),
            avg_glucose_level: cells[7],
            bmi: cells[8],
            smoking_status: code(cells[9]),
        }
    }

    /// Cells in [`FEATURE_COLUMNS`] order.
    pub fn cells(&self) -> [Option<f64>; 11] {
        let code = |v: Option<i32>| v.map(f64::from);
        [
            Some(self.id as f64),
            code(self.gender),
            self.age,
            code(self.hypertension),
            code(self.heart_disease),
            code(self.ever_married),
            code(self.work_type),
            code(self.residence_type),
            self.avg_glucose_level,
            self.bmi,
            code(self.smoking_status),
        ]
    }

    /// Numeric feature vector; missing cells become `NaN`.
    pub fn to_features(&self) -> [f64; 11] {
        self.cells().map(|cell| cell.unwrap_or(f64::NAN))
    }

    pub fn is_complete(&self) -> bool {
        self.cells().iter().all(Option::is_some)
    }
}

/// Predicted class and the probability of the positive (stroke) class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub class: u8,
    pub probability: f64,
}

impl PredictionResult {
    pub fn is_stroke(&self) -> bool {
        self.class == 1
    }

    pub fn message(&self) -> String {
        if self.is_stroke() {
            format!(
                "⚠️ Risiko Stroke Terdeteksi! Probabilitas: {:.2}",
                self.probability
            )
        } else {
            format!(
                "✅ Tidak Terindikasi Stroke. Probabilitas: {:.2}",
                self.probability
            )
        }
    }
}
