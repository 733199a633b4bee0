//! priming-toolbox - run priming experiments from the terminal.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments, configuration or runtime failure
//!   2 - The participant already took part (`simulate --external-id` while saving)

mod cli;
mod gateway;
mod report;
mod settings;
mod simulate;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cli::{Args, Command, DatabaseArgs, ExperimentSource, ResultsArgs, SimulateArgs};
use gateway::RestGateway;
use primex_experiment::export::{self, CsvOptions};
use primex_experiment::config::DataConfig;
use primex_experiment::persistence::records_for_run;
use primex_experiment::share::from_link;
use primex_experiment::{
    experimenter_results, submit_in_background, summarize, Error, ExperimentConfig, Experimenter, PersistenceGateway,
    SharedExperiment,
};
use settings::{ExperimentFile, Settings, SETTINGS_FILE};
use simulate::ParticipantModel;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(&args);
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout stays clean for JSON and CSV.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn run(args: Args) -> Result<i32> {
    let settings = load_settings(&args)?;
    match args.command {
        Command::Generate { source, seed, json } => {
            generate(&source, seed, json)?;
            Ok(0)
        }
        Command::Simulate(sim) => simulate(sim, settings).await,
        Command::Link {
            source,
            email,
            experiment_id,
            base_url,
        } => {
            let file = resolve_source(&source)?;
            file.experiment.validate()?;
            let experimenter = Experimenter {
                email,
                experiment_id,
            };
            let base_url = base_url.unwrap_or(settings.share.base_url);
            let link = SharedExperiment::new(file.experiment, experimenter).link(&base_url)?;
            println!("{}", link);
            Ok(0)
        }
        Command::Results(res) => {
            results(res, settings).await?;
            Ok(0)
        }
        Command::InspectLink { link } => {
            inspect_link(&link)?;
            Ok(0)
        }
        Command::NewExperiment {
            preset,
            output,
            force,
        } => {
            let file = ExperimentFile {
                experimenter: None,
                experiment: settings::preset(&preset)?,
            };
            write_new_file(&output, &file.to_toml()?, force)?;
            println!("Created {} from preset '{}'.", output.display(), preset);
            Ok(0)
        }
        Command::InitConfig { force } => {
            write_new_file(Path::new(SETTINGS_FILE), &Settings::default_toml(), force)?;
            println!("Created {} with default settings.", SETTINGS_FILE);
            Ok(0)
        }
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    match &args.config {
        Some(path) => Settings::load(path),
        None => Ok(Settings::load_default()?.unwrap_or_default()),
    }
}

fn resolve_source(source: &ExperimentSource) -> Result<ExperimentFile> {
    match (&source.experiment, &source.preset) {
        (Some(path), _) => ExperimentFile::load(path),
        (None, Some(name)) => Ok(ExperimentFile {
            experimenter: None,
            experiment: settings::preset(name)?,
        }),
        (None, None) => bail!("either --experiment or --preset is required"),
    }
}

fn write_new_file(path: &Path, content: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists. Pass --force to overwrite it.",
            path.display()
        );
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn generate(source: &ExperimentSource, seed: Option<u64>, json: bool) -> Result<()> {
    let config = resolve_source(source)?.experiment;
    let mut rng = simulate::rng_from_seed(seed);
    let trials = primex_experiment::generate(&config, &mut rng)?;
    let expected = config.expected_trial_count();
    if trials.len() != expected {
        warn!(count = trials.len(), expected, "trial count differs from the configured design");
    }
    info!(count = trials.len(), paradigm = config.paradigm.kind().as_str(), "trials generated");
    if json {
        println!("{}", serde_json::to_string_pretty(&trials)?);
    } else {
        print!("{}", report::render_trials(&trials));
    }
    Ok(())
}

async fn simulate(args: SimulateArgs, settings: Settings) -> Result<i32> {
    let file = resolve_source(&args.source)?;
    let config = file.experiment;
    config.validate()?;

    let save = args.save || config.data.save;
    let gateway = if save {
        Some(Arc::new(rest_gateway(&args.database, &settings, "saving results")?))
    } else {
        None
    };
    let table = results_table(&args.database, &settings, &config.data.table_name);

    if let (Some(gw), Some(external_id)) = (&gateway, &args.external_id) {
        let experiment_id = file
            .experimenter
            .as_ref()
            .map_or(config.id.as_str(), |e| e.experiment_id.as_str());
        match gw.check_duplicate(&table, experiment_id, external_id).await {
            Ok(true) => {
                eprintln!(
                    "Participant {} has already taken part in {}.",
                    external_id, experiment_id
                );
                return Ok(2);
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "duplicate check failed, continuing"),
        }
    }

    let model = ParticipantModel::from_settings(&settings.simulation, &args);
    info!(
        experiment = %config.id,
        realtime = args.realtime,
        "starting simulated run"
    );
    let run = {
        let config = config.clone();
        let (seed, external_id, realtime) = (args.seed, args.external_id.clone(), args.realtime);
        tokio::task::spawn_blocking(move || {
            simulate::run_simulation(config, model, seed, external_id, realtime)
        })
        .await
        .context("Simulation task panicked")??
    };

    let pending_save = gateway.map(|gw| {
        let records = records_for_run(&config, &run, file.experimenter.as_ref());
        submit_in_background(gw, table.clone(), records)
    });

    let kind = config.paradigm.kind();
    let summary = summarize(run.results(), kind);
    let interpretation = report::interpretation(&config, &summary);
    let csv_options = CsvOptions {
        bom: settings.export.bom && !args.no_bom,
    };

    if let Some(path) = &args.csv {
        export::result_table(run.results(), kind)
            .to_csv_string(csv_options)
            .map_err(anyhow::Error::from)
            .and_then(|csv| std::fs::write(path, csv).map_err(anyhow::Error::from))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "results written");
    }
    if let Some(path) = &args.summary_csv {
        export::summary_table(&summary)
            .to_csv_string(csv_options)
            .map_err(anyhow::Error::from)
            .and_then(|csv| std::fs::write(path, csv).map_err(anyhow::Error::from))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "summary written");
    }
    if let Some(path) = &args.xlsx {
        let raw = export::result_table(run.results(), kind);
        let totals = export::summary_table(&summary);
        export::workbook(&[(export::RAW_DATA_SHEET, &raw), (export::SUMMARY_SHEET, &totals)])
            .map_err(anyhow::Error::from)
            .and_then(|bytes| std::fs::write(path, bytes).map_err(anyhow::Error::from))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "workbook written");
    }

    if args.json {
        let report = report::RunReport {
            experiment_id: &config.id,
            participant_id: run.participant_id(),
            external_id: run.external_id(),
            summary: &summary,
            interpretation: &interpretation,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Participant: {}", run.participant_id());
        print!("{}", report::render_summary(&config, &summary, &interpretation));
    }

    if let Some(handle) = pending_save {
        let wait = Duration::from_secs(settings.persistence.save_wait_seconds);
        match tokio::time::timeout(wait, handle).await {
            Ok(Ok(Ok(()))) => println!("Results saved to '{}'.", table),
            Ok(Ok(Err(e))) => eprintln!("Results were not saved: {}", e),
            Ok(Err(e)) => eprintln!("Save task failed: {}", e),
            Err(_) => warn!(seconds = wait.as_secs(), "save still pending, giving up waiting"),
        }
    }
    Ok(0)
}

/// Endpoint and key from the flags, the environment or `[persistence]`.
fn rest_gateway(db: &DatabaseArgs, settings: &Settings, purpose: &str) -> Result<RestGateway> {
    let url = db
        .api_url
        .clone()
        .or_else(|| settings.persistence.url.clone())
        .with_context(|| {
            format!("{purpose} needs a database URL (--api-url, PRIMEX_API_URL or [persistence] url)")
        })?;
    let key = db
        .api_key
        .clone()
        .or_else(|| settings.persistence.api_key.clone())
        .with_context(|| {
            format!("{purpose} needs an API key (--api-key, PRIMEX_API_KEY or [persistence] api_key)")
        })?;
    Ok(RestGateway::new(&url, &key))
}

fn results_table(db: &DatabaseArgs, settings: &Settings, fallback: &str) -> String {
    db.table
        .clone()
        .or_else(|| settings.persistence.table.clone())
        .unwrap_or_else(|| fallback.to_string())
}

async fn results(args: ResultsArgs, settings: Settings) -> Result<()> {
    let gateway = rest_gateway(&args.database, &settings, "fetching results")?;
    let table = results_table(&args.database, &settings, &DataConfig::default().table_name);
    let records = experimenter_results(&gateway, &table, &args.email, &args.experiment_id).await?;
    let participants = records
        .iter()
        .map(|r| r.participant_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    info!(rows = records.len(), participants, table = %table, "results fetched");

    if let Some(path) = &args.csv {
        export::record_table(&records)
            .to_csv_string(CsvOptions {
                bom: settings.export.bom && !args.no_bom,
            })
            .map_err(anyhow::Error::from)
            .and_then(|csv| std::fs::write(path, csv).map_err(anyhow::Error::from))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "Wrote {} rows from {} participants to {}.",
            records.len(),
            participants,
            path.display()
        );
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", report::render_records(&records));
    }
    Ok(())
}

fn inspect_link(link: &str) -> Result<()> {
    let decoded = from_link(link).unwrap_or_else(|| SharedExperiment::decode(link));
    let file = match decoded {
        Ok(shared) => ExperimentFile {
            experimenter: Some(shared.experimenter),
            experiment: shared.config,
        },
        Err(Error::DecodeFailure(reason)) => {
            warn!(%reason, "link could not be decoded, showing the default setup");
            eprintln!("Could not decode the link ({reason}); showing the default setup instead.");
            ExperimentFile {
                experimenter: None,
                experiment: ExperimentConfig::stroop("en", "he")?,
            }
        }
        Err(e) => return Err(e.into()),
    };
    print!("{}", file.to_toml()?);
    Ok(())
}
