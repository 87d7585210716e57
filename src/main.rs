use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::{debug, info, LevelFilter};
use polars::prelude::PolarsError;
use thiserror::Error;

use stroke_risk::config::AppConfig;
use stroke_risk::error::{BatchError, ConfigError, ModelError, ValidationError};
use stroke_risk::flow::{run_batch_table, Event, Interaction, Outcome};
use stroke_risk::model::{ForestModel, Predictor};
use stroke_risk::records::PatientForm;
use stroke_risk::server::{self, AppState, ServerError};
use stroke_risk::table::{infer_file_type, read_csv, write_table, WriteFormat};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct StrokeArgs {
    #[arg(short, long, help = "JSON config file")]
    config: Option<PathBuf>,
    #[arg(short, long, help = "Model artifact, overrides the config")]
    model: Option<PathBuf>,
    #[arg(long, help = "Reject uploads containing unknown labels")]
    strict_labels: bool,
    #[arg(short, long, action = clap::ArgAction::Count, help = "Verbose level")]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the prediction page
    Serve {
        #[arg(short, long, help = "Listen address")]
        address: Option<SocketAddr>,
        #[arg(short, long, help = "Stylesheet injected into the page")]
        stylesheet: Option<PathBuf>,
    },
    /// Predict a single patient
    Predict {
        #[arg(long, default_value = "Male")]
        gender: String,
        #[arg(long, default_value = "30")]
        age: String,
        #[arg(long, default_value = "Tidak")]
        hypertension: String,
        #[arg(long, default_value = "Tidak")]
        heart_disease: String,
        #[arg(long, default_value = "No")]
        ever_married: String,
        #[arg(long, default_value = "Private")]
        work_type: String,
        #[arg(long, default_value = "Urban")]
        residence_type: String,
        #[arg(long, default_value = "90.0")]
        avg_glucose_level: String,
        #[arg(long, default_value = "22.0")]
        bmi: String,
        #[arg(long, default_value = "formerly smoked")]
        smoking_status: String,
    },
    /// Predict every row of a CSV file
    Batch {
        #[arg(help = "Input CSV")]
        input: PathBuf,
        #[arg(short, long, help = "Write the augmented table here")]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, help = "Output format, inferred from the extension if absent")]
        format: Option<WriteFormat>,
    },
}

#[derive(Error, Debug)]
enum StrokeAppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),
    #[error("could not read or write table: {0}")]
    Polars(#[from] PolarsError),
    #[error("cannot infer output format of {path:?}")]
    OutputFormat { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), StrokeAppError> {
    let cli = StrokeArgs::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("STROKE_LOG");
    Builder::new()
        .filter(Some("stroke_risk"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    stroke_app(cli).await
}

async fn stroke_app(cli: StrokeArgs) -> Result<(), StrokeAppError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(model) = cli.model {
        config = config.with_model_path(model);
    }
    if cli.strict_labels {
        config = config.with_strict_labels(true);
    }

    match cli.command {
        Command::Serve {
            address,
            stylesheet,
        } => {
            if let Some(address) = address {
                config = config.with_address(address);
            }
            if let Some(stylesheet) = stylesheet {
                config = config.with_stylesheet_path(stylesheet);
            }
            let state = Arc::new(AppState::load(config)?);
            server::serve(state).await?;
        }
        Command::Predict {
            gender,
            age,
            hypertension,
            heart_disease,
            ever_married,
            work_type,
            residence_type,
            avg_glucose_level,
            bmi,
            smoking_status,
        } => {
            let predictor = Predictor::from_model(ForestModel::load(&config.model_path)?);
            let form = PatientForm {
                gender,
                age,
                hypertension,
                heart_disease,
                ever_married,
                work_type,
                residence_type,
                avg_glucose_level,
                bmi,
                smoking_status,
            };
            match Interaction::new(&predictor, config.strict_labels).handle(Event::Submit(form))? {
                Outcome::Verdict(verdict) => println!("{}", verdict.result.message()),
                Outcome::Invalid(e) => return Err(e.into()),
                _ => {}
            }
        }
        Command::Batch {
            input,
            output,
            format,
        } => {
            let start_time = Instant::now();
            let predictor = Predictor::from_model(ForestModel::load(&config.model_path)?);
            let df = read_csv(&input)?;
            let mut result = run_batch_table(&predictor, df, config.strict_labels)?;

            println!("{}", result.table);
            for unmapped in &result.unmapped {
                println!("unknown label: {unmapped}");
            }
            if let Some(report) = &result.report {
                println!("{report}");
            }

            if let Some(path) = output {
                let format = format
                    .or_else(|| infer_file_type(&path))
                    .ok_or_else(|| StrokeAppError::OutputFormat { path: path.clone() })?;
                write_table(&path, format, &mut result.table)?;
                info!("wrote {} rows to {:?}", result.rows.len(), path);
            }
            info!("batch finished in {:?}", start_time.elapsed());
        }
    }

    Ok(())
}
