use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use stroke_risk::config::AppConfig;
use stroke_risk::server::{router, AppState};

const BOUNDARY: &str = "stroke-risk-test-boundary";

fn bundled_config() -> AppConfig {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    AppConfig::default()
        .with_model_path(root.join("models/stroke_forest.json"))
        .with_stylesheet_path(root.join("assets/style.css"))
}

fn app() -> Router {
    let state = AppState::load(bundled_config()).unwrap();
    router(Arc::new(state))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload_request(file: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"patients.csv\"\r\nContent-Type: text/csv\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/batch")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

const REFERENCE_PATIENT: &str = "gender=Male&age=67&hypertension=Ya&heart_disease=Tidak&ever_married=Yes&work_type=Private&Residence_type=Urban&avg_glucose_level=228.69&bmi=36.6&smoking_status=formerly+smoked";

#[tokio::test]
async fn index_renders_form_with_stylesheet() {
    let response = app()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    let css = std::fs::read_to_string(bundled_config().stylesheet_path).unwrap();
    assert!(html.contains(&format!("<style>{css}</style>")));
    assert!(html.contains("Prediksi Risiko Stroke"));
    assert!(html.contains("name=\"smoking_status\""));
}

#[tokio::test]
async fn health_is_ok() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn form_submission_renders_verdict() {
    let response = app().oneshot(form_request(REFERENCE_PATIENT)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("Probabilitas: "));
    assert!(html.contains("alert alert-error") || html.contains("alert alert-success"));
    // submitted choices are kept in the form
    assert!(html.contains("<option value=\"Ya\" selected>Ya</option>"));
}

#[tokio::test]
async fn out_of_range_age_is_reported_inline() {
    let body = REFERENCE_PATIENT.replace("age=67", "age=101");
    let html = body_text(app().oneshot(form_request(&body)).await.unwrap()).await;
    assert!(html.contains("alert alert-warning"));
    assert!(html.contains("age 101 out of range"));
}

#[tokio::test]
async fn upload_renders_table_and_report() {
    let csv = "id,gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status,stroke\n\
        9046,Male,67,0,1,Yes,Private,Urban,228.69,36.6,formerly smoked,1\n\
        51676,Female,61,0,0,Yes,Self-employed,Rural,202.21,N/A,never smoked,1\n\
        31112,Male,80,0,1,Yes,Private,Rural,105.92,32.5,never smoked,1\n\
        60182,Female,49,0,0,Yes,Private,Urban,171.23,34.4,smokes,0\n";
    let response = app().oneshot(upload_request(csv.as_bytes())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("Hasil Prediksi (4 baris)"));
    assert!(html.contains("<td>9046</td>"));
    assert!(html.contains("Classification Report"));
    assert!(!html.contains("Gagal memproses file"));
}

#[tokio::test]
async fn upload_without_stroke_column_omits_report() {
    let csv = "gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status\n\
        Male,67,Ya,Tidak,Yes,Retired,Urban,228.69,36.6,formerly smoked\n";
    let html = body_text(app().oneshot(upload_request(csv.as_bytes())).await.unwrap()).await;
    assert!(html.contains("Hasil Prediksi (1 baris)"));
    assert!(!html.contains("Classification Report"));
    assert!(html.contains("work_type=&quot;Retired&quot;"));
}

#[tokio::test]
async fn malformed_upload_leaves_form_working() {
    let app = app();
    let html = body_text(
        app.clone()
            .oneshot(upload_request(b"\x00\x01\x02 not a table"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(html.matches("Gagal memproses file").count(), 1);

    let html = body_text(app.oneshot(form_request(REFERENCE_PATIENT)).await.unwrap()).await;
    assert!(html.contains("Probabilitas: "));
}

#[tokio::test]
async fn long_upload_with_late_text_cells_is_predicted() {
    let mut csv = String::from(
        "gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status,stroke\n",
    );
    for i in 0..150 {
        csv.push_str(&format!(
            "Female,{},{},0,Yes,Private,Urban,95.1,24.3,never smoked,0\n",
            30 + i % 40,
            i % 2
        ));
    }
    csv.push_str("Male,79,Ya,Ya,Yes,Self-employed,Rural,174.12,N/A,smokes,1\n");

    let response = app().oneshot(upload_request(csv.as_bytes())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("Hasil Prediksi (151 baris)"));
    assert!(html.contains("Classification Report"));
    assert!(!html.contains("Gagal memproses file"));
}
