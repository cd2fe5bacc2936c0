use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use labs_core::{LabObservation, LabsConfig};
use labs_loader::LabsLoader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod files;

use files::{FileConcepts, FileObservations};

#[derive(Parser, Debug)]
#[command(
    name = "labs-cli",
    about = "Assemble a patient's lab results from FHIR observation and concept fixtures."
)]
struct Args {
    /// Patient the observation bundle belongs to.
    #[arg(short, long)]
    patient: String,
    /// Searchset bundle holding all of the patient's lab observations, newest first.
    #[arg(short, long)]
    observations: PathBuf,
    /// JSON array of full concept representations.
    #[arg(short, long)]
    concepts: PathBuf,
    #[arg(long)]
    page_size: Option<usize>,
    #[arg(long)]
    prefetch_pages: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("labs_loader=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = LabsConfig::default();
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if let Some(prefetch_pages) = args.prefetch_pages {
        config.prefetch_pages = prefetch_pages;
    }

    let observations = FileObservations::load(&args.observations, &args.patient)?;
    let concepts = FileConcepts::load(&args.concepts)?;
    let loader = LabsLoader::new(Arc::new(observations), Arc::new(concepts), config)?;

    let results = loader.load_patient_data(&args.patient).await?;

    println!("Result groups: {}", results.len());
    for (name, group) in results.groups() {
        let latest = group.entries.first().map(describe).unwrap_or_default();
        println!(
            "{name} [{}] {} result(s), latest: {latest}",
            group.type_name,
            group.entries.len()
        );
    }

    let reloaded = loader.load_patient_data(&args.patient).await?;
    println!("Second load served from cache: {}", Arc::ptr_eq(&results, &reloaded));

    Ok(())
}

fn describe(observation: &LabObservation) -> String {
    let when = observation
        .effective_date_time
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    if observation.is_panel() {
        let members = observation
            .members
            .iter()
            .map(describe_value)
            .collect::<Vec<_>>()
            .join(", ");
        return format!("{when} ({members})");
    }

    format!("{when} {}", describe_value(observation))
}

fn describe_value(observation: &LabObservation) -> String {
    let value = match (observation.value, &observation.value_text) {
        (Some(value), _) => value.to_string(),
        (None, Some(text)) => text.clone(),
        (None, None) => "-".to_string(),
    };
    let unit = observation
        .meta
        .as_ref()
        .and_then(|meta| meta.units.as_deref())
        .map(|unit| format!(" {unit}"))
        .unwrap_or_default();
    let flag = observation
        .interpretation
        .filter(|interpretation| interpretation.is_abnormal())
        .map(|interpretation| format!(" {interpretation}"))
        .unwrap_or_default();

    format!("{}: {value}{unit}{flag}", observation.name)
}
