pub mod import;
pub mod output;
pub mod subjects;

use std::path::PathBuf;

use anyhow::Result;
use clap::{builder::FalseyValueParser, Parser, Subcommand};
use import::{process_import_command, ImportCommand};
use output::{analytics::render_analytics, render_dashboard, Style};
use subjects::{
    process_reset_command, process_subject_command, process_threshold_command, SubjectCommand,
};
use tracing::debug;

use crate::{
    tracker::{
        storage::{JsonFileStorage, StateStorage},
        Tracker,
    },
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "attend", version)]
#[command(about = "Track class attendance and see how many classes you can skip", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Option<Commands>,
    #[arg(
        long,
        global = true,
        env = "ATTEND_DIR",
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long = "no-color",
        global = true,
        env = "NO_COLOR",
        value_parser = FalseyValueParser::new(),
        help = "Disable coloured output. Any non-empty NO_COLOR value counts"
    )]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Overall attendance and every subject, least safe first. Default command")]
    Dashboard,
    #[command(about = "Attendance bar for every subject")]
    Analytics,
    #[command(flatten)]
    Subject(SubjectCommand),
    #[command(about = "Show or change the minimum required attendance")]
    Threshold {
        #[arg(
            value_parser = clap::value_parser!(u8).range(0..=100),
            help = "New minimum attendance in percent, 0 to 100"
        )]
        value: Option<u8>,
    },
    #[command(about = "Delete all subjects and restore the default settings")]
    Reset {
        #[arg(long, help = "Confirm deleting everything. This can't be undone")]
        yes: bool,
    },
    #[command(about = "Add subjects from a photo of an attendance table")]
    Import {
        #[command(flatten)]
        command: ImportCommand,
    },
}

/// Per-invocation application state handed to every command.
pub struct Context<S: StateStorage> {
    pub tracker: Tracker<S>,
    pub style: Style,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    enable_logging(&app_dir, args.log)?;
    debug!("Using application directory {app_dir:?}");

    let storage = JsonFileStorage::new(app_dir)?;
    let mut context = Context {
        tracker: Tracker::load(storage).await?,
        style: Style {
            color: !args.no_color,
        },
    };

    run_command(&mut context, args.commands.unwrap_or(Commands::Dashboard)).await
}

async fn run_command<S: StateStorage>(context: &mut Context<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Dashboard => {
            let min_attendance = context.tracker.profile().min_attendance;
            print!(
                "{}",
                render_dashboard(context.tracker.subjects(), min_attendance, context.style)
            );
            Ok(())
        }
        Commands::Analytics => {
            let min_attendance = context.tracker.profile().min_attendance;
            print!(
                "{}",
                render_analytics(context.tracker.subjects(), min_attendance, context.style)
            );
            Ok(())
        }
        Commands::Subject(command) => process_subject_command(context, command).await,
        Commands::Threshold { value } => process_threshold_command(context, value).await,
        Commands::Reset { yes } => process_reset_command(context, yes).await,
        Commands::Import { command } => process_import_command(context, command).await,
    }
}
