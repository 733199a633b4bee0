//! Command-line interface.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// priming-toolbox - run priming experiments from the terminal
///
/// Generates trial lists, plays them through the timed phase sequence with a
/// simulated participant, summarizes the reaction times and builds links that
/// carry an experiment to participants.
///
/// Examples:
///   priming-toolbox generate --preset stroop:en:he
///   priming-toolbox simulate --preset number:masked --seed 7 --csv results.csv
///   priming-toolbox link --experiment study.toml --email me@lab.org --experiment-id pilot-1
///   priming-toolbox inspect-link "https://lab.org/run.html?exp=eyJj..."
///   priming-toolbox results --email me@lab.org --experiment-id pilot-1 --csv pilot.csv
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (defaults to .priming-toolbox.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the trial list an experiment would play
    Generate {
        #[command(flatten)]
        source: ExperimentSource,

        /// Seed for reproducible shuffling and sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Play a full run with a simulated participant
    Simulate(SimulateArgs),

    /// Build a participant link carrying the experiment
    Link {
        #[command(flatten)]
        source: ExperimentSource,

        /// Experimenter contact, stored with every result
        #[arg(long)]
        email: String,

        /// Experimenter's own identifier for this study (at least 3 characters)
        #[arg(long, value_name = "ID")]
        experiment_id: String,

        /// Page that runs the experiment (defaults to the settings value)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },

    /// Decode a participant link or bare token
    InspectLink {
        /// Link or token
        #[arg(value_name = "LINK")]
        link: String,
    },

    /// Download the stored results of a shared experiment
    Results(ResultsArgs),

    /// Write an experiment file from a built-in preset
    NewExperiment {
        /// stroop:<lang>:<lang>, number:masked, number:explicit or generic
        #[arg(long, default_value = "stroop:en:he")]
        preset: String,

        #[arg(short, long, default_value = "experiment.toml", value_name = "FILE")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Generate a default .priming-toolbox.toml settings file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Where the experiment comes from: a file or a built-in preset.
#[derive(ClapArgs, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ExperimentSource {
    /// Experiment file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub experiment: Option<PathBuf>,

    /// Built-in experiment: stroop:<lang>:<lang>, number:masked, number:explicit or generic
    #[arg(short, long)]
    pub preset: Option<String>,
}

/// Where stored results live. Falls back to the `[persistence]` settings.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DatabaseArgs {
    /// Database endpoint (PostgREST-compatible)
    #[arg(long, env = "PRIMEX_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Database API key
    #[arg(long, env = "PRIMEX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Results table (defaults to the settings or experiment value)
    #[arg(long)]
    pub table: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ResultsArgs {
    /// Experimenter email the results were shared under
    #[arg(long)]
    pub email: String,

    /// Experimenter's identifier for the study
    #[arg(long, value_name = "ID")]
    pub experiment_id: String,

    /// Write the rows as CSV instead of listing them
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Omit the UTF-8 byte-order mark from CSV output
    #[arg(long)]
    pub no_bom: bool,

    /// Print the rows as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub source: ExperimentSource,

    /// Seed for trial order and participant behaviour
    #[arg(long)]
    pub seed: Option<u64>,

    /// Sleep through every phase on the real clock instead of a virtual one
    #[arg(long)]
    pub realtime: bool,

    /// Participant identifier from a recruitment platform
    #[arg(long, value_name = "ID")]
    pub external_id: Option<String>,

    /// Write per-trial results as CSV
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Write the summary statistics as CSV
    #[arg(long, value_name = "FILE")]
    pub summary_csv: Option<PathBuf>,

    /// Omit the UTF-8 byte-order mark from CSV output
    #[arg(long)]
    pub no_bom: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Write per-trial results and the summary as an Excel workbook
    #[arg(long, value_name = "FILE")]
    pub xlsx: Option<PathBuf>,

    /// Submit the results to the configured database (also on when the
    /// experiment sets `data.save`)
    #[arg(long)]
    pub save: bool,

    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Mean simulated reaction time in milliseconds
    #[arg(long, value_name = "MS")]
    pub mean_rt: Option<f64>,

    /// Probability of pressing the correct key (0.0 - 1.0)
    #[arg(long)]
    pub accuracy: Option<f64>,

    /// Extra milliseconds the participant needs on incongruent or baseline trials
    #[arg(long, value_name = "MS", allow_hyphen_values = true)]
    pub effect: Option<f64>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }
        if let Command::Simulate(sim) = &self.command {
            if let Some(acc) = sim.accuracy {
                if !(0.0..=1.0).contains(&acc) {
                    return Err("Accuracy must be between 0.0 and 1.0".to_string());
                }
            }
            if let Some(rt) = sim.mean_rt {
                if rt <= 0.0 {
                    return Err("Mean RT must be positive".to_string());
                }
            }
        }
        let database = match &self.command {
            Command::Simulate(sim) => Some(&sim.database),
            Command::Results(res) => Some(&res.database),
            _ => None,
        };
        if let Some(url) = database.and_then(|db| db.api_url.as_ref()) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }
        Ok(())
    }

    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
