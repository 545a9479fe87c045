use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ordo_runtime::EngineConfig;

use crate::domains::{board_seed, cultivation_seed};
use crate::error::Result;
use crate::walkthrough::{DragPlan, Report, render_text, walk};

#[derive(Debug, Parser)]
#[command(
    name = "ordo-demo",
    about = "Drag one item between ordered containers and watch it persist",
    version
)]
pub struct Cli {
    /// Output style for the report and for logs on stderr.
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Engine config file (`.toml` or `.json`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reorder cards on a three-column board.
    Board(DragArgs),

    /// Move planted areas between greenhouse zones.
    Cultivation(DragArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DragArgs {
    /// Item to drag.
    #[arg(long, value_name = "ITEM")]
    pub drag: String,

    /// Drop onto this item; the dragged item lands in front of it.
    #[arg(long, value_name = "ITEM", conflicts_with = "into", required_unless_present = "into")]
    pub onto: Option<String>,

    /// Drop into the end of this container.
    #[arg(long, value_name = "CONTAINER")]
    pub into: Option<String>,

    /// Tenant sent with every remote call.
    #[arg(long, default_value = "demo")]
    pub tenant: String,

    /// Fail the next order replacement for this container.
    #[arg(long, value_name = "CONTAINER")]
    pub fail_replace: Vec<String>,

    /// Fail the next placement update for this item.
    #[arg(long, value_name = "ITEM")]
    pub fail_update: Vec<String>,

    /// Fail the next item listing for this container.
    #[arg(long, value_name = "CONTAINER")]
    pub fail_items: Vec<String>,
}

impl From<DragArgs> for DragPlan {
    fn from(args: DragArgs) -> Self {
        Self {
            item: args.drag,
            onto: args.onto,
            into: args.into,
            tenant: args.tenant,
            fail_replace: args.fail_replace,
            fail_update: args.fail_update,
            fail_items: args.fail_items,
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    crate::init_tracing(cli.log_format);
    run(cli)
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::from_file(path)?.validated()?),
        None => Ok(EngineConfig::default()),
    }
}

/// Runs the selected walkthrough and returns its report.
pub fn execute(cli: &Cli) -> Result<Report> {
    let config = load_config(cli.config.as_ref())?;
    match &cli.command {
        Commands::Board(args) => walk("board", board_seed(), &args.clone().into(), config),
        Commands::Cultivation(args) => {
            walk("cultivation", cultivation_seed(), &args.clone().into(), config)
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let report = execute(&cli)?;
    match cli.log_format {
        LogFormat::Pretty => print!("{}", render_text(&report)),
        LogFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use crate::error::DemoError;

    use super::{Cli, Commands, LogFormat, execute, run};

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ordo-demo",
            "board",
            "--drag",
            "card-1",
            "--into",
            "review",
            "--log-format",
            "json",
            "--fail-replace",
            "todo",
            "--fail-replace",
            "review",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Board(args) = cli.command else {
            panic!("expected board");
        };
        assert_eq!(args.fail_replace, ["todo", "review"]);
        assert_eq!(args.tenant, "demo");
    }

    #[test]
    fn target_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["ordo-demo", "board", "--drag", "card-1"]).is_err());
        assert!(
            Cli::try_parse_from([
                "ordo-demo", "board", "--drag", "card-1", "--onto", "card-2", "--into", "todo",
            ])
            .is_err()
        );
    }

    #[test]
    fn board_walkthrough_runs() {
        let cli = Cli::try_parse_from([
            "ordo-demo",
            "board",
            "--drag",
            "card-3",
            "--onto",
            "card-1",
        ])
        .unwrap();
        let report = execute(&cli).unwrap();
        assert_eq!(report.domain, "board");
        assert!(report.after_sync[0].items[0].starts_with("card-3 "));
        assert!(run(cli).is_ok());
    }

    #[test]
    fn invalid_config_file_is_a_config_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[drag]\ndrag_threshold = 0").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "ordo-demo",
            "--config",
            &path,
            "cultivation",
            "--drag",
            "bed-a",
            "--into",
            "south",
        ])
        .unwrap();
        let err = execute(&cli).unwrap_err();
        assert!(matches!(err, DemoError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
