use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use prepline::config::AppConfig;
use prepline::error::PreplineError;
use prepline::service::{ConfigureRequest, Service, TransformRequest};
use prepline::training::FormFields;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "prepline",
    about = "Stage, clean and configure training for tabular datasets"
)]
pub struct Cli {
    /// Path to a JSON settings file
    #[arg(long, global = true, env = prepline::config::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Directory holding staged artifacts. Overrides the settings file.
    #[arg(long, global = true)]
    pub staging_dir: Option<PathBuf>,

    /// Log to the console only
    #[arg(long, global = true)]
    pub no_log_files: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate and stage a CSV file, printing its schema summary
    Ingest {
        /// CSV file to upload
        file: PathBuf,
    },
    /// Run the cleaning pipeline on a staged upload
    Transform {
        /// Identifier returned by `ingest`
        #[arg(long)]
        id: String,

        /// Original filename of the upload
        #[arg(long)]
        filename: String,

        /// Where to write the processed table. Defaults to `processed_<FILENAME>`
        /// in the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Assemble a training configuration for a processed dataset
    Configure {
        /// Identifier returned by `ingest`
        #[arg(long)]
        id: String,

        /// Original filename of the upload
        #[arg(long)]
        filename: String,

        /// Form field as KEY=VALUE, repeatable (e.g. `layers[0][type]=dense`)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,

        /// JSON object of form fields, merged before `--field` values
        #[arg(long)]
        fields_file: Option<PathBuf>,
    },
}

/// Settings after applying command-line overrides.
///
/// # Errors
///
/// Returns error if the settings file exists but cannot be parsed.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.staging_dir {
        config.staging_dir.clone_from(dir);
    }
    Ok(config)
}

pub async fn run_command(command: Commands, config: AppConfig) -> Result<()> {
    let service = Service::from_config(config)?;

    match command {
        Commands::Ingest { file } => handle_ingest(&service, &file).await,
        Commands::Transform {
            id,
            filename,
            output,
        } => handle_transform(&service, id, filename, output.as_deref()).await,
        Commands::Configure {
            id,
            filename,
            fields,
            fields_file,
        } => handle_configure(&service, id, filename, &fields, fields_file.as_deref()).await,
    }
}

async fn handle_ingest(service: &Service, file: &Path) -> Result<()> {
    let filename = file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", file.display()))?
        .to_string_lossy()
        .into_owned();
    let bytes = std::fs::read(file)
        .map_err(PreplineError::from)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let response = service.ingest(filename, bytes).await?;
    print_json(&response)
}

async fn handle_transform(
    service: &Service,
    identifier: String,
    filename: String,
    output: Option<&Path>,
) -> Result<()> {
    let response = service
        .transform(TransformRequest {
            identifier,
            filename,
        })
        .await?;

    let path = output.map_or_else(|| PathBuf::from(&response.filename), Path::to_path_buf);
    std::fs::write(&path, &response.bytes)
        .map_err(PreplineError::from)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "Wrote processed table");

    print_json(&response)
}

async fn handle_configure(
    service: &Service,
    identifier: String,
    filename: String,
    pairs: &[String],
    fields_file: Option<&Path>,
) -> Result<()> {
    let mut fields = match fields_file {
        Some(path) => load_fields(path)?,
        None => FormFields::new(),
    };
    for pair in pairs {
        let (key, value) = FormFields::parse_pair(pair)?;
        fields.push(key, value);
    }

    let response = service
        .configure(ConfigureRequest {
            identifier,
            filename,
            fields,
        })
        .await?;
    print_json(&response)
}

fn load_fields(path: &Path) -> Result<FormFields> {
    let content = std::fs::read_to_string(path)
        .map_err(PreplineError::from)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content).map_err(PreplineError::from)?;
    Ok(FormFields::from_json(&value)?)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_fields_collect_in_order() {
        let cli = Cli::parse_from([
            "prepline",
            "configure",
            "--id",
            "abc",
            "--filename",
            "data.csv",
            "--field",
            "metrics=accuracy",
            "--field",
            "metrics=precision",
        ]);
        let Commands::Configure { id, fields, .. } = cli.command else {
            panic!("expected configure");
        };
        assert_eq!(id, "abc");
        assert_eq!(fields, vec!["metrics=accuracy", "metrics=precision"]);
    }

    #[test]
    fn test_staging_dir_flag_overrides_settings() -> Result<()> {
        let cli = Cli::parse_from([
            "prepline",
            "--staging-dir",
            "/tmp/prepline-staging",
            "ingest",
            "data.csv",
        ]);
        let config = load_config(&cli)?;
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/prepline-staging"));
        Ok(())
    }
}
