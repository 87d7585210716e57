//! HTML rendering of the prediction page.

use std::fmt::Write;

use crate::encoding::{GENDER, RESIDENCE, SMOKING, WORK_TYPE};
use crate::flow::{BatchResult, Outcome};
use crate::records::{PatientForm, FEATURE_COLUMNS, MAX_AGE, MIN_AGE};

const YES_NO_LOCAL: [&str; 2] = ["Tidak", "Ya"];
const YES_NO_EN: [&str; 2] = ["No", "Yes"];

/// Unmapped cells listed under the results table before truncating.
const MAX_LISTED_UNMAPPED: usize = 20;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the full page: form, upload, and whatever the last interaction produced.
pub fn page(stylesheet: &str, form: &PatientForm, outcome: Option<&Outcome>) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Prediksi Risiko Stroke</title>\n");
    let _ = writeln!(html, "<style>{stylesheet}</style>");
    html.push_str("</head>\n<body>\n");
    html.push_str("<h1>🧠 Prediksi Risiko Stroke</h1>\n");
    html.push_str(
        "<p>Masukkan data pasien atau upload CSV untuk memprediksi risiko stroke.</p>\n",
    );

    html.push_str("<h2>📋 Input Manual</h2>\n");
    html.push_str(&manual_form(form));
    match outcome {
        Some(Outcome::Verdict(verdict)) => {
            let class = if verdict.result.is_stroke() {
                "alert alert-error"
            } else {
                "alert alert-success"
            };
            let _ = writeln!(
                html,
                "<div class=\"{class}\">{}</div>",
                escape_html(&verdict.result.message())
            );
        }
        Some(Outcome::Invalid(e)) => {
            let _ = writeln!(
                html,
                "<div class=\"alert alert-warning\">Input tidak valid: {}</div>",
                escape_html(&e.to_string())
            );
        }
        _ => {}
    }

    html.push_str("<h2>📂 Upload CSV</h2>\n");
    html.push_str(
        "<form method=\"post\" action=\"/batch\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"file\" accept=\".csv,text/csv\">\n\
         <button type=\"submit\">📊 Prediksi Batch</button>\n</form>\n",
    );
    match outcome {
        Some(Outcome::Batch(result)) => html.push_str(&batch_section(result)),
        Some(Outcome::BatchFailed(message)) => {
            let _ = writeln!(
                html,
                "<div class=\"alert alert-error\">Gagal memproses file: {}</div>",
                escape_html(message)
            );
        }
        _ => {}
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn select<'a>(
    html: &mut String,
    name: &str,
    label: &str,
    options: impl IntoIterator<Item = &'a str>,
    selected: &str,
) {
    let _ = writeln!(html, "<label for=\"{name}\">{label}</label>");
    let _ = writeln!(html, "<select id=\"{name}\" name=\"{name}\">");
    for option in options {
        let mark = if option == selected { " selected" } else { "" };
        let option = escape_html(option);
        let _ = writeln!(html, "<option value=\"{option}\"{mark}>{option}</option>");
    }
    html.push_str("</select>\n");
}

fn number(html: &mut String, name: &str, label: &str, bounds: &str, value: &str) {
    let _ = writeln!(html, "<label for=\"{name}\">{label}</label>");
    let _ = writeln!(
        html,
        "<input type=\"number\" id=\"{name}\" name=\"{name}\" {bounds} value=\"{}\">",
        escape_html(value)
    );
}

fn manual_form(form: &PatientForm) -> String {
    let mut html = String::from("<form method=\"post\" action=\"/predict\" class=\"manual\">\n");
    select(&mut html, "gender", "Jenis Kelamin", GENDER.labels(), &form.gender);
    number(
        &mut html,
        "age",
        "Usia",
        &format!("min=\"{MIN_AGE}\" max=\"{MAX_AGE}\" step=\"1\""),
        &form.age,
    );
    select(&mut html, "hypertension", "Punya Hipertensi?", YES_NO_LOCAL, &form.hypertension);
    select(
        &mut html,
        "heart_disease",
        "Punya Penyakit Jantung?",
        YES_NO_LOCAL,
        &form.heart_disease,
    );
    select(&mut html, "ever_married", "Sudah Menikah?", YES_NO_EN, &form.ever_married);
    select(&mut html, "work_type", "Tipe Pekerjaan", WORK_TYPE.labels(), &form.work_type);
    select(
        &mut html,
        "Residence_type",
        "Tempat Tinggal",
        RESIDENCE.labels(),
        &form.residence_type,
    );
    number(
        &mut html,
        "avg_glucose_level",
        "Rata-rata Kadar Glukosa",
        "min=\"0\" step=\"any\"",
        &form.avg_glucose_level,
    );
    number(&mut html, "bmi", "BMI", "min=\"0\" step=\"any\"", &form.bmi);
    select(
        &mut html,
        "smoking_status",
        "Status Merokok",
        SMOKING.labels(),
        &form.smoking_status,
    );
    html.push_str("<button type=\"submit\">🔍 Prediksi</button>\n</form>\n");
    html
}

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "NaN".to_string(),
    }
}

fn batch_section(result: &BatchResult) -> String {
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<h3>Hasil Prediksi ({} baris)</h3>\n<table class=\"results\">\n<thead><tr>",
        result.rows.len()
    );
    for name in FEATURE_COLUMNS.iter().chain(&["prediction", "probability"]) {
        let _ = write!(html, "<th>{name}</th>");
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for (row, prediction) in &result.rows {
        let class = if prediction.is_stroke() { " class=\"positive\"" } else { "" };
        let _ = write!(html, "<tr{class}>");
        for value in row.cells() {
            let _ = write!(html, "<td>{}</td>", cell(value));
        }
        let _ = writeln!(
            html,
            "<td>{}</td><td>{:.2}</td></tr>",
            prediction.class, prediction.probability
        );
    }
    html.push_str("</tbody>\n</table>\n");

    if !result.unmapped.is_empty() {
        let _ = writeln!(
            html,
            "<div class=\"alert alert-warning\">{} sel memiliki label tidak dikenal dan diprediksi dengan nilai kosong:<ul>",
            result.unmapped.len()
        );
        for unmapped in result.unmapped.iter().take(MAX_LISTED_UNMAPPED) {
            let _ = writeln!(html, "<li>{}</li>", escape_html(&unmapped.to_string()));
        }
        html.push_str("</ul></div>\n");
    }

    if let Some(report) = &result.report {
        let _ = writeln!(
            html,
            "<h3>Classification Report</h3>\n<pre class=\"report\">{}</pre>",
            escape_html(&report.to_string())
        );
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::flow::Verdict;
    use crate::records::PredictionResult;

    fn verdict(class: u8, probability: f64) -> Outcome {
        let form = PatientForm::default();
        let record = form.validate().unwrap();
        Outcome::Verdict(Verdict {
            row: record.encode().unwrap(),
            record,
            result: PredictionResult { class, probability },
        })
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"R&D\"</b>"),
            "&lt;b&gt;&quot;R&amp;D&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn injects_stylesheet_verbatim() {
        let html = page("h1 { color: #c00; }", &PatientForm::default(), None);
        assert!(html.contains("<style>h1 { color: #c00; }</style>"));
        assert!(html.contains("action=\"/predict\""));
        assert!(html.contains("enctype=\"multipart/form-data\""));
        assert!(!html.contains("alert"));
    }

    #[test]
    fn verdicts_use_distinct_alerts() {
        let positive = page("", &PatientForm::default(), Some(&verdict(1, 0.81)));
        assert!(positive.contains("alert alert-error"));
        assert!(positive.contains("Probabilitas: 0.81"));

        let negative = page("", &PatientForm::default(), Some(&verdict(0, 0.12)));
        assert!(negative.contains("alert alert-success"));
        assert!(negative.contains("Tidak Terindikasi Stroke. Probabilitas: 0.12"));
    }

    #[test]
    fn form_keeps_submitted_choices() {
        let form = PatientForm {
            work_type: "children".into(),
            ..PatientForm::default()
        };
        let html = page("", &form, None);
        assert!(html.contains("<option value=\"children\" selected>children</option>"));
        assert!(html.contains("<option value=\"Private\">Private</option>"));
    }

    #[test]
    fn invalid_input_and_batch_failure_are_inline() {
        let invalid = Outcome::Invalid(ValidationError::AgeOutOfRange { age: 140 });
        assert!(page("", &PatientForm::default(), Some(&invalid)).contains("age 140 out of range"));

        let failed = Outcome::BatchFailed("missing required columns: <bmi>".into());
        let html = page("", &PatientForm::default(), Some(&failed));
        assert!(html.contains("Gagal memproses file: missing required columns: &lt;bmi&gt;"));
    }
}
