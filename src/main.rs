//! lmsgrowth: growth reference calculations from the command line.
//!
//! Results are printed to stdout as JSON. Logs go to stderr or a log file,
//! never to stdout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lmsgrowth::adapters::json::{load_profile, JsonReferenceFile};
use lmsgrowth::config::{GrowthConfig, LogMode};
use lmsgrowth::domain::{self, Gestation};
use lmsgrowth::{GrowthCalculator, MeasurementType, Observation, ReferenceProfile, Sex};

/// UK-WHO growth reference calculations (LMS method)
#[derive(Parser, Debug)]
#[command(name = "lmsgrowth", version)]
#[command(after_help = "\
Examples:
  lmsgrowth --reference uk_who.json sds --measurement height --sex male --age 1.0 --value 76
  lmsgrowth --reference uk_who.json value --measurement weight --sex female --age 4.5 --centile 91
  lmsgrowth --reference uk_who.json centiles --measurement ofc --sex male --birth 2023-01-10 --observed 2023-07-02
  lmsgrowth age --birth 2024-03-01 --observed 2024-09-01 --gestation-weeks 30
  lmsgrowth bmi --height 110 --weight 19.5")]
struct Cli {
    /// Reference data JSON file (overrides LMSGROWTH_REFERENCE_PATH)
    #[arg(long, global = true)]
    reference: Option<PathBuf>,

    /// Expected SHA-256 of the reference file (overrides LMSGROWTH_REFERENCE_SHA256)
    #[arg(long, global = true)]
    sha256: Option<String>,

    /// Interpolation profile JSON (overrides LMSGROWTH_PROFILE_PATH; default UK-WHO)
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// SDS, centile and percentage of median for one measurement
    Sds {
        #[arg(long, short = 'm')]
        measurement: MeasurementType,
        #[arg(long, short = 's')]
        sex: Sex,
        #[command(flatten)]
        age: AgeArgs,
        /// Observed value (cm, kg or kg/m²)
        #[arg(long)]
        value: f64,
    },

    /// Measurement value at an SDS or a centile
    Value {
        #[arg(long, short = 'm')]
        measurement: MeasurementType,
        #[arg(long, short = 's')]
        sex: Sex,
        #[command(flatten)]
        age: AgeArgs,
        #[arg(long, allow_hyphen_values = true, conflicts_with = "centile", required_unless_present = "centile")]
        sds: Option<f64>,
        /// Centile, strictly between 0 and 100
        #[arg(long)]
        centile: Option<f64>,
    },

    /// Values of the nine chart centile lines at one age
    Centiles {
        #[arg(long, short = 'm')]
        measurement: MeasurementType,
        #[arg(long, short = 's')]
        sex: Sex,
        #[command(flatten)]
        age: AgeArgs,
    },

    /// Calculate a JSON array of observations
    Batch {
        /// File holding `[{"age", "measurement", "sex", "value"}, ...]`
        #[arg(long, short = 'i')]
        input: PathBuf,
    },

    /// Decimal age from dates, corrected for preterm birth
    Age {
        #[arg(long)]
        birth: NaiveDate,
        #[arg(long)]
        observed: NaiveDate,
        #[command(flatten)]
        gestation: GestationArgs,
    },

    /// Body mass index from height and weight
    Bmi {
        /// Height in cm
        #[arg(long)]
        height: f64,
        /// Weight in kg
        #[arg(long)]
        weight: f64,
    },
}

/// Age as a decimal, or as birth and observation dates.
#[derive(Args, Debug)]
struct AgeArgs {
    /// Decimal age in years (negative before term)
    #[arg(long, allow_hyphen_values = true, conflicts_with_all = ["birth", "observed"], required_unless_present = "birth")]
    age: Option<f64>,
    #[arg(long, requires = "observed")]
    birth: Option<NaiveDate>,
    #[arg(long, requires = "birth")]
    observed: Option<NaiveDate>,
    #[command(flatten)]
    gestation: GestationArgs,
}

#[derive(Args, Debug)]
struct GestationArgs {
    /// Completed weeks of gestation at birth
    #[arg(long, default_value_t = 40)]
    gestation_weeks: u32,
    /// Extra days of gestation (0-6)
    #[arg(long, default_value_t = 0)]
    gestation_days: u32,
}

impl GestationArgs {
    fn gestation(&self) -> Result<Gestation> {
        Ok(Gestation::new(self.gestation_weeks, self.gestation_days)?)
    }
}

impl AgeArgs {
    fn decimal_age(&self) -> Result<f64> {
        match (self.age, self.birth, self.observed) {
            (Some(age), _, _) => Ok(age),
            (None, Some(birth), Some(observed)) => Ok(domain::corrected_decimal_age(
                birth,
                observed,
                self.gestation.gestation()?,
            )?),
            _ => bail!("Either --age or both --birth and --observed are required"),
        }
    }
}

#[derive(Serialize)]
struct ValueOutput {
    measurement: MeasurementType,
    sex: Sex,
    age: f64,
    sds: f64,
    centile: f64,
    value: f64,
}

#[derive(Serialize)]
struct AgeOutput {
    chronological_age: f64,
    corrected_age: f64,
    preterm: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum BatchItem {
    Ok(lmsgrowth::Calculation),
    Err { observation: Observation, error: String },
}

fn main() -> Result<()> {
    let config = GrowthConfig::from_env_or_default();

    let (writer, _guard) = match config.log_mode {
        LogMode::File => {
            if let Some(parent) = config.log_file.parent() {
                // Best-effort: an existing directory is fine.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.log_file)
                .with_context(|| format!("Failed to open log file {:?}", config.log_file))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();

    let cli = Cli::parse();
    run(cli, config)
}

fn run(cli: Cli, config: GrowthConfig) -> Result<()> {
    match &cli.command {
        Commands::Sds {
            measurement,
            sex,
            age,
            value,
        } => {
            let calculator = open_calculator(&cli, &config)?;
            let observation = Observation::new(age.decimal_age()?, *measurement, *sex, *value);
            print_json(&calculator.calculate(&observation)?)
        }
        Commands::Value {
            measurement,
            sex,
            age,
            sds,
            centile,
        } => {
            let calculator = open_calculator(&cli, &config)?;
            let age = age.decimal_age()?;
            let sds = match (sds, centile) {
                (Some(sds), _) => *sds,
                (None, Some(c)) => domain::sds_for_centile(*c)
                    .with_context(|| format!("Centile {c} must be between 0 and 100"))?,
                (None, None) => bail!("One of --sds or --centile is required"),
            };
            let value = calculator.measurement_from_sds(*measurement, sds, *sex, age)?;
            print_json(&ValueOutput {
                measurement: *measurement,
                sex: *sex,
                age,
                sds,
                centile: calculator.centile(sds),
                value,
            })
        }
        Commands::Centiles {
            measurement,
            sex,
            age,
        } => {
            let calculator = open_calculator(&cli, &config)?;
            print_json(&calculator.centile_lines(*measurement, *sex, age.decimal_age()?)?)
        }
        Commands::Batch { input } => {
            let calculator = open_calculator(&cli, &config)?;
            let content = std::fs::read_to_string(input)
                .with_context(|| format!("Failed to read {input:?}"))?;
            let observations: Vec<Observation> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid observations in {input:?}"))?;

            let items: Vec<BatchItem> = observations
                .iter()
                .zip(calculator.calculate_batch(&observations))
                .map(|(observation, result)| match result {
                    Ok(calculation) => BatchItem::Ok(calculation),
                    Err(e) => BatchItem::Err {
                        observation: *observation,
                        error: e.to_string(),
                    },
                })
                .collect();
            print_json(&items)
        }
        Commands::Age {
            birth,
            observed,
            gestation,
        } => {
            let gestation = gestation.gestation()?;
            print_json(&AgeOutput {
                chronological_age: domain::decimal_age(*birth, *observed)?,
                corrected_age: domain::corrected_decimal_age(*birth, *observed, gestation)?,
                preterm: gestation.is_preterm(),
            })
        }
        Commands::Bmi { height, weight } => {
            let bmi = domain::bmi_from_height_weight(*height, *weight)?;
            print_json(&serde_json::json!({ "bmi": bmi }))
        }
    }
}

fn open_calculator(cli: &Cli, config: &GrowthConfig) -> Result<GrowthCalculator> {
    let Some(path) = cli.reference.as_ref().or(config.reference_path.as_ref()) else {
        bail!("No reference data: pass --reference or set LMSGROWTH_REFERENCE_PATH");
    };

    let mut source = JsonReferenceFile::new(path);
    if let Some(digest) = cli.sha256.as_ref().or(config.reference_sha256.as_ref()) {
        source = source.with_sha256(digest.as_str());
    }

    let profile = match cli.profile.as_ref().or(config.profile_path.as_ref()) {
        Some(path) => read_profile(path)?,
        None => ReferenceProfile::uk_who(),
    };

    Ok(GrowthCalculator::from_source(&source, profile)?)
}

fn read_profile(path: &Path) -> Result<ReferenceProfile> {
    let profile = load_profile(path)?;
    tracing::info!("Using interpolation profile '{}' from {path:?}", profile.name);
    Ok(profile)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
