//! Interaction state machine for the single-record and batch flows.
//!
//! Each interaction starts Idle, moves through Validating, Predicting and
//! Displaying, and ends Idle again. Interactions are request-scoped; nothing
//! survives them except the shared [`Predictor`].

use log::{debug, info, warn};
use polars::prelude::*;

use crate::error::{BatchError, ModelError, ValidationError};
use crate::features::{encode_batch, EncodedBatch, UnmappedCell};
use crate::model::Predictor;
use crate::records::{EncodedFeatureRow, PatientForm, PatientRecord, PredictionResult};
use crate::report::ClassificationReport;
use crate::table::read_table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Predicting,
    Displaying,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// Manual form submission.
    Submit(PatientForm),
    /// Raw bytes of an uploaded delimited file.
    Upload(Vec<u8>),
}

/// Result of one manually entered record.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub record: PatientRecord,
    pub row: EncodedFeatureRow,
    pub result: PredictionResult,
}

#[derive(Debug)]
pub struct BatchResult {
    pub rows: Vec<(EncodedFeatureRow, PredictionResult)>,
    pub labels: Option<Vec<i32>>,
    pub report: Option<ClassificationReport>,
    pub unmapped: Vec<UnmappedCell>,
    /// Encoded features plus `prediction` and `probability` columns.
    pub table: DataFrame,
}

#[derive(Debug)]
pub enum Outcome {
    Verdict(Verdict),
    Invalid(ValidationError),
    Batch(BatchResult),
    BatchFailed(String),
}

pub struct Interaction<'p> {
    predictor: &'p Predictor,
    strict_labels: bool,
    phase: Phase,
    trail: Vec<Phase>,
}

impl<'p> Interaction<'p> {
    pub fn new(predictor: &'p Predictor, strict_labels: bool) -> Self {
        Self {
            predictor,
            strict_labels,
            phase: Phase::Idle,
            trail: vec![Phase::Idle],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase visited so far, starting with Idle.
    pub fn trail(&self) -> &[Phase] {
        &self.trail
    }

    fn enter(&mut self, phase: Phase) {
        debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.trail.push(phase);
    }

    /// Drive one event to completion.
    ///
    /// Batch failures are caught and returned as [`Outcome::BatchFailed`].
    /// A model failure on a single record is not recoverable and is returned
    /// as an error.
    pub fn handle(&mut self, event: Event) -> Result<Outcome, ModelError> {
        let outcome = match event {
            Event::Submit(form) => self.submit(&form),
            Event::Upload(bytes) => Ok(self.upload(&bytes)),
        };
        self.enter(Phase::Idle);
        outcome
    }

    fn submit(&mut self, form: &PatientForm) -> Result<Outcome, ModelError> {
        self.enter(Phase::Validating);
        let validated = form.validate().and_then(|record| {
            let row = record.encode()?;
            Ok((record, row))
        });
        let (record, row) = match validated {
            Ok(valid) => valid,
            Err(e) => {
                info!("rejected form: {e}");
                self.enter(Phase::Displaying);
                return Ok(Outcome::Invalid(e));
            }
        };

        self.enter(Phase::Predicting);
        let results = self.predictor.classify(std::slice::from_ref(&row))?;
        let result = results[0];
        info!(
            "single prediction class={} probability={:.4}",
            result.class, result.probability
        );

        self.enter(Phase::Displaying);
        Ok(Outcome::Verdict(Verdict {
            record,
            row,
            result,
        }))
    }

    fn upload(&mut self, bytes: &[u8]) -> Outcome {
        self.enter(Phase::Validating);
        let outcome = match read_table(bytes)
            .map_err(BatchError::from)
            .and_then(|df| self.run_batch(df))
        {
            Ok(result) => Outcome::Batch(result),
            Err(e) => {
                warn!("batch upload failed: {e}");
                Outcome::BatchFailed(e.to_string())
            }
        };
        self.enter(Phase::Displaying);
        outcome
    }

    fn run_batch(&mut self, df: DataFrame) -> Result<BatchResult, BatchError> {
        let batch = encode_batch(df, self.strict_labels)?;
        self.enter(Phase::Predicting);
        predict_batch(self.predictor, batch)
    }
}

/// Predict every encoded row and assemble the result table and report.
pub fn predict_batch(
    predictor: &Predictor,
    batch: EncodedBatch,
) -> Result<BatchResult, BatchError> {
    let predictions = predictor.classify(&batch.rows)?;

    let mut table = batch.features;
    let classes: Vec<i32> = predictions.iter().map(|p| i32::from(p.class)).collect();
    let probabilities: Vec<f64> = predictions.iter().map(|p| p.probability).collect();
    table.with_column(Series::new("prediction", classes.clone()))?;
    table.with_column(Series::new("probability", probabilities))?;

    let report = batch
        .labels
        .as_deref()
        .and_then(|labels| ClassificationReport::new(labels, &classes));
    info!(
        "batch of {} rows predicted, {} flagged positive",
        predictions.len(),
        classes.iter().filter(|&&c| c == 1).count()
    );

    Ok(BatchResult {
        rows: batch.rows.into_iter().zip(predictions).collect(),
        labels: batch.labels,
        report,
        unmapped: batch.unmapped,
        table,
    })
}

/// Run a table already in memory through the batch pipeline.
pub fn run_batch_table(
    predictor: &Predictor,
    df: DataFrame,
    strict_labels: bool,
) -> Result<BatchResult, BatchError> {
    let batch = encode_batch(df, strict_labels)?;
    predict_batch(predictor, batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::stump_forest;
    use pretty_assertions::assert_eq;

    const UPLOAD: &str = "gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status\n\
        Male,67,Ya,Tidak,Yes,Private,Urban,228.69,36.6,formerly smoked\n\
        Female,80,No,Yes,Yes,Retired,Rural,105.92,32.5,never smoked\n\
        Female,49,No,No,Yes,Private,Urban,171.23,34.4,smokes\n";

    fn predictor() -> Predictor {
        Predictor::from_model(stump_forest())
    }

    fn reference_form() -> PatientForm {
        PatientForm {
            gender: "Male".into(),
            age: "67".into(),
            hypertension: "Ya".into(),
            heart_disease: "Tidak".into(),
            ever_married: "Yes".into(),
            work_type: "Private".into(),
            residence_type: "Urban".into(),
            avg_glucose_level: "228.69".into(),
            bmi: "36.6".into(),
            smoking_status: "formerly smoked".into(),
        }
    }

    #[test]
    fn submission_walks_every_phase() {
        let predictor = predictor();
        let mut interaction = Interaction::new(&predictor, false);
        let outcome = interaction.handle(Event::Submit(reference_form())).unwrap();

        assert_eq!(
            interaction.trail(),
            &[
                Phase::Idle,
                Phase::Validating,
                Phase::Predicting,
                Phase::Displaying,
                Phase::Idle
            ]
        );
        match outcome {
            Outcome::Verdict(verdict) => {
                assert_eq!(verdict.row.gender, Some(1));
                assert_eq!(verdict.result.class, 1);
                assert!(verdict.result.message().starts_with("⚠️ Risiko Stroke Terdeteksi!"));
            }
            other => panic!("expected verdict, got {other:?}"),
        }
    }

    #[test]
    fn invalid_submission_skips_prediction() {
        let predictor = predictor();
        let mut interaction = Interaction::new(&predictor, false);
        let form = PatientForm {
            age: "140".into(),
            ..reference_form()
        };
        let outcome = interaction.handle(Event::Submit(form)).unwrap();

        assert!(matches!(
            outcome,
            Outcome::Invalid(ValidationError::AgeOutOfRange { age: 140 })
        ));
        assert!(!interaction.trail().contains(&Phase::Predicting));
        assert_eq!(interaction.phase(), Phase::Idle);
    }

    #[test]
    fn unmapped_row_is_still_predicted_from_missing_input() {
        let predictor = predictor();
        let mut interaction = Interaction::new(&predictor, false);
        let outcome = interaction
            .handle(Event::Upload(UPLOAD.as_bytes().to_vec()))
            .unwrap();

        let result = match outcome {
            Outcome::Batch(result) => result,
            other => panic!("expected batch, got {other:?}"),
        };
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[1].0.work_type, None);
        assert_eq!(result.unmapped.len(), 1);
        // the stumps never split on work_type, so the row scores as if complete
        let (_, second) = result.rows[1];
        assert!((second.probability - (0.7 + 0.2) / 2.0).abs() < 1e-9);
        assert_eq!(result.table.height(), 3);
        assert_eq!(result.table.width(), 13);
    }

    #[test]
    fn upload_without_labels_has_no_report() {
        let predictor = predictor();
        let mut interaction = Interaction::new(&predictor, false);
        match interaction
            .handle(Event::Upload(UPLOAD.as_bytes().to_vec()))
            .unwrap()
        {
            Outcome::Batch(result) => {
                assert!(result.labels.is_none());
                assert!(result.report.is_none());
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn upload_with_labels_is_evaluated() {
        let text = "gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status,stroke\n\
            Male,67,Ya,Tidak,Yes,Private,Urban,228.69,36.6,formerly smoked,1\n\
            Female,30,No,No,No,Private,Urban,80.0,22.0,never smoked,0\n";
        let predictor = predictor();
        let result = match Interaction::new(&predictor, false)
            .handle(Event::Upload(text.as_bytes().to_vec()))
            .unwrap()
        {
            Outcome::Batch(result) => result,
            other => panic!("expected batch, got {other:?}"),
        };
        let report = result.report.unwrap();
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.support, 2);
    }

    #[test]
    fn broken_upload_fails_alone() {
        let predictor = predictor();
        let mut interaction = Interaction::new(&predictor, false);
        let outcome = interaction
            .handle(Event::Upload(b"this is not a table\x00\x01".to_vec()))
            .unwrap();
        assert!(matches!(outcome, Outcome::BatchFailed(_)));
        assert_eq!(interaction.phase(), Phase::Idle);

        let outcome = interaction.handle(Event::Submit(reference_form())).unwrap();
        assert!(matches!(outcome, Outcome::Verdict(_)));
    }

    #[test]
    fn strict_labels_fail_the_upload() {
        let predictor = predictor();
        let outcome = Interaction::new(&predictor, true)
            .handle(Event::Upload(UPLOAD.as_bytes().to_vec()))
            .unwrap();
        match outcome {
            Outcome::BatchFailed(message) => assert!(message.contains("Retired")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
