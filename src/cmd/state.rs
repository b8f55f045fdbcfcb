//! Checkpoint inspection and control: `status`, `resume-signal`, `reset`.

use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;

use autopilot::orchestrator::{CheckpointStore, ResumeSignal};
use autopilot::pilot_config::PilotConfig;

pub fn cmd_status(project_dir: PathBuf) -> Result<()> {
    let pilot = PilotConfig::new(project_dir)?;
    let store = CheckpointStore::new(pilot.checkpoint_path());
    let signal = ResumeSignal::new(pilot.resume_signal_path());

    let record = match store.read_record() {
        Ok(Some(record)) => record,
        Ok(None) => {
            println!("No unfinished run (no checkpoint at {})", store.path().display());
            return Ok(());
        }
        Err(e) => {
            println!(
                "{} Checkpoint at {} is unreadable: {:#}",
                style("!").red().bold(),
                store.path().display(),
                e
            );
            println!("A resumed run will discard it and start fresh.");
            return Ok(());
        }
    };

    let run = &record.run;
    let state = &record.state;
    println!();
    println!("{}", style("Unfinished run").bold());
    println!("  Intent:      {}", style(&run.intent).cyan());
    println!(
        "  Progress:    job {} of {} (phase {})",
        state.song_index + 1,
        run.count,
        style(state.phase).yellow()
    );
    if let Some(title) = state.title() {
        println!("  Title:       {}", title);
    }
    if state.spec.is_some() {
        println!("  Profile:     {}", state.profile);
    }
    println!(
        "  Waits:       {}s between steps, {}s between jobs",
        run.wait_phase_seconds, run.wait_between_jobs_seconds
    );
    println!("  Export:      {}", run.export_mode);
    if let Some(err) = &state.last_error {
        println!("  Last error:  {}", style(err).red());
    }
    if signal.is_raised() {
        println!("  Resume flag: {}", style("raised").green());
    }
    println!();
    println!("Continue with: autopilot run {:?} --resume", run.intent);
    Ok(())
}

pub fn cmd_resume_signal(project_dir: PathBuf) -> Result<()> {
    let pilot = PilotConfig::new(project_dir)?;
    let signal = ResumeSignal::new(pilot.resume_signal_path());
    signal
        .raise()
        .with_context(|| format!("Failed to write {}", signal.path().display()))?;
    println!("Resume signal written to {}", signal.path().display());
    Ok(())
}

pub fn cmd_reset(project_dir: PathBuf, force: bool) -> Result<()> {
    use dialoguer::Confirm;

    let pilot = PilotConfig::new(project_dir)?;
    let store = CheckpointStore::new(pilot.checkpoint_path());
    let signal = ResumeSignal::new(pilot.resume_signal_path());

    if !store.exists() && !signal.is_raised() {
        println!("Nothing to reset");
        return Ok(());
    }

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This discards the checkpoint of the unfinished run. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    store.clear()?;
    signal
        .clear()
        .with_context(|| format!("Failed to remove {}", signal.path().display()))?;

    println!("Reset complete");
    Ok(())
}
