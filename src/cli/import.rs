use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::debug;

use crate::{
    import::{
        gemini::{DEFAULT_ENDPOINT, DEFAULT_MODEL},
        import_subjects, GeminiExtractor, ImageInput,
    },
    tracker::storage::StateStorage,
};

use super::{output::render_import_report, Context};

#[derive(Args, Debug)]
pub struct ImportCommand {
    #[arg(help = "Photo or screenshot of an attendance table. png, jpeg, webp, gif or heic")]
    image: PathBuf,
    #[arg(long, help = "Show what would be imported without saving anything")]
    dry_run: bool,
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "ATTEND_GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long, env = "ATTEND_GEMINI_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
}

pub async fn process_import_command<S: StateStorage>(
    context: &mut Context<S>,
    command: ImportCommand,
) -> Result<()> {
    debug!(
        "Importing from {:?} with model {} at {}",
        command.image, command.model, command.endpoint
    );
    let image = ImageInput::from_path(&command.image).await?;
    let extractor = GeminiExtractor::new(command.endpoint, command.model, command.api_key);

    let report =
        import_subjects(&mut context.tracker, &extractor, &image, command.dry_run).await?;
    print!("{}", render_import_report(&report, command.dry_run));
    Ok(())
}
