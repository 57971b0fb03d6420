use anyhow::{bail, Result};
use clap::Subcommand;
use tracing::info;

use crate::{
    attendance::{percentage, summary::SubjectStanding},
    tracker::{
        entities::{SubjectDraft, SubjectId, SubjectRecord, SubjectUpdate},
        storage::StateStorage,
    },
    utils::percentage::Percentage,
};

use super::{
    output::{render_standing, render_subject_list},
    Context,
};

#[derive(Subcommand, Debug)]
pub enum SubjectCommand {
    #[command(about = "List subjects in the order they were added")]
    List {
        #[arg(
            short,
            long,
            help = "Only show subjects with attendance below this percentage. Examples are \"75\", \"62.5%\""
        )]
        below: Option<Percentage>,
    },
    #[command(about = "Add a subject")]
    Add {
        #[arg(long, help = "Short label, for example CSEN2031")]
        code: String,
        #[arg(long, help = "Full subject name")]
        name: String,
        #[arg(long, default_value_t = 0, help = "Classes attended so far")]
        present: u32,
        #[arg(long, default_value_t = 0, help = "Classes held so far")]
        total: u32,
    },
    #[command(about = "Change fields of a subject")]
    Edit {
        id: SubjectId,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        present: Option<u32>,
        #[arg(long)]
        total: Option<u32>,
    },
    #[command(about = "Delete a subject")]
    Delete { id: SubjectId },
    #[command(about = "Record an attended class")]
    Present { id: SubjectId },
    #[command(about = "Record a missed class")]
    Absent { id: SubjectId },
}

pub async fn process_subject_command<S: StateStorage>(
    context: &mut Context<S>,
    command: SubjectCommand,
) -> Result<()> {
    match command {
        SubjectCommand::List { below } => {
            let subjects = subjects_below(context.tracker.subjects(), below);
            print!("{}", render_subject_list(&subjects));
            Ok(())
        }
        SubjectCommand::Add {
            code,
            name,
            present,
            total,
        } => {
            let id = context
                .tracker
                .add(SubjectDraft::new(code, name, present, total))
                .await?;
            println!("Added subject #{id}");
            print_standing(context, id);
            Ok(())
        }
        SubjectCommand::Edit {
            id,
            code,
            name,
            present,
            total,
        } => {
            let update = SubjectUpdate {
                code,
                name,
                present,
                total,
            };
            if update.is_empty() {
                bail!("Nothing to change. Pass at least one of --code, --name, --present, --total");
            }
            context.tracker.update(id, &update).await?;
            print_standing(context, id);
            Ok(())
        }
        SubjectCommand::Delete { id } => {
            let removed = context.tracker.delete(id).await?;
            println!("Deleted #{} {} {}", removed.id, removed.code, removed.name);
            Ok(())
        }
        SubjectCommand::Present { id } => {
            if context.tracker.mark_present(id).await? {
                print_standing(context, id);
            } else {
                eprintln!("No subject #{id}, nothing changed");
            }
            Ok(())
        }
        SubjectCommand::Absent { id } => {
            if context.tracker.mark_absent(id).await? {
                print_standing(context, id);
            } else {
                eprintln!("No subject #{id}, nothing changed");
            }
            Ok(())
        }
    }
}

/// Subjects in insertion order, optionally only those strictly below `limit`.
fn subjects_below(subjects: &[SubjectRecord], limit: Option<Percentage>) -> Vec<&SubjectRecord> {
    subjects
        .iter()
        .filter(|s| match limit {
            Some(limit) => *percentage(u64::from(s.present), u64::from(s.total)) < *limit,
            None => true,
        })
        .collect()
}

fn print_standing<S: StateStorage>(context: &Context<S>, id: SubjectId) {
    let min_attendance = context.tracker.profile().min_attendance;
    if let Some(subject) = context.tracker.store().get(id) {
        let standing = SubjectStanding::evaluate(subject, i64::from(min_attendance));
        println!("{}", render_standing(&standing, min_attendance, context.style));
    }
}

pub async fn process_threshold_command<S: StateStorage>(
    context: &mut Context<S>,
    value: Option<u8>,
) -> Result<()> {
    if let Some(value) = value {
        context.tracker.set_min_attendance(i64::from(value)).await?;
        info!("Minimum attendance set to {value}");
    }
    println!(
        "Minimum attendance {}%",
        context.tracker.profile().min_attendance
    );
    Ok(())
}

pub async fn process_reset_command<S: StateStorage>(
    context: &mut Context<S>,
    confirmed: bool,
) -> Result<()> {
    if !confirmed {
        bail!(
            "This deletes all {} subjects and settings. Run again with --yes to confirm",
            context.tracker.subjects().len()
        );
    }
    context.tracker.reset_all().await?;
    println!("All subjects deleted and settings restored");
    Ok(())
}
