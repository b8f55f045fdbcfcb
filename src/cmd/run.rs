//! `autopilot run` and `autopilot plan`.

use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::super::{Cli, RunArgs};

use autopilot::audit::JsonlLog;
use autopilot::config::{RunConfig, RunOverrides};
use autopilot::errors::AutopilotError;
use autopilot::executor::{CommandExecutor, DryRunExecutor, StepExecutor};
use autopilot::orchestrator::{Autopilot, RunOutcome, render_table, tally};
use autopilot::phase2::coordinator::Phase2Coordinator;
use autopilot::pilot_config::PilotConfig;
use autopilot::planner::{PlannerChain, PlannerStrategy};
use autopilot::spec::ExportMode;
use autopilot::ui::PilotUI;

fn overrides_from(args: &RunArgs) -> Result<RunOverrides> {
    let planner = args
        .planner
        .as_deref()
        .map(str::parse::<PlannerStrategy>)
        .transpose()?;
    let export_mode = args
        .export
        .as_deref()
        .map(str::parse::<ExportMode>)
        .transpose()?;

    Ok(RunOverrides {
        count: args.count,
        resume: args.resume,
        planner,
        model: args.model.clone(),
        phase2: args.phase2,
        candidate_count: args.candidates,
        wait_phase_seconds: args.wait_phase,
        wait_between_jobs_seconds: args.wait_between,
        export_mode,
        step_retries: args.retries,
        stop_on_error: args.stop_on_error,
        no_pause: args.no_pause,
        max_hours: args.max_hours,
    })
}

fn build_executor(pilot: &PilotConfig, dry_run: bool) -> Result<Arc<dyn StepExecutor>> {
    if dry_run {
        return Ok(Arc::new(DryRunExecutor));
    }
    let exec = &pilot.toml.executor;
    let (Some(create), Some(export)) = (exec.create_cmd.as_deref(), exec.export_cmd.as_deref())
    else {
        anyhow::bail!(
            "No step commands configured. Set [executor] create_cmd and export_cmd in {} \
             (or AUTOPILOT_CREATE_CMD / AUTOPILOT_EXPORT_CMD), or pass --dry-run.",
            pilot.config_file().display()
        );
    };
    Ok(Arc::new(CommandExecutor::new(
        create,
        export,
        pilot.project_dir.clone(),
        Duration::from_secs(exec.timeout_secs),
    )))
}

pub async fn cmd_run(cli: &Cli, project_dir: PathBuf, args: &RunArgs) -> Result<()> {
    let pilot = PilotConfig::new(project_dir)?;
    for warning in pilot.validate() {
        tracing::warn!("{}", warning);
    }

    let mut config = RunConfig::from_pilot(args.intent.clone(), &pilot);
    overrides_from(args)?.apply(&mut config);
    if config.count == 0 {
        anyhow::bail!("--count must be at least 1");
    }

    let executor = build_executor(&pilot, args.dry_run)?;
    let chain = PlannerChain::from_strategy(config.planner, config.model.clone());

    println!(
        "{} {} ({} job{}, planner {}, executor {})",
        style("Autopilot").bold(),
        style(&config.intent).cyan(),
        config.count,
        if config.count == 1 { "" } else { "s" },
        chain.names().join(" > "),
        executor.name()
    );

    let ui = Arc::new(PilotUI::new(config.count as u64, cli.verbose));
    let autopilot = Autopilot::new(config, chain, executor).with_ui(Arc::clone(&ui));

    let stop = autopilot.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.request();
        }
    });

    let result = autopilot.run().await;
    match &result {
        Ok(report) if report.outcome.is_completed() => ui.finish("done", true),
        Ok(_) => ui.finish("stopped", false),
        Err(_) => ui.finish("failed", false),
    }

    match result {
        Ok(report) => {
            println!();
            println!("{}", render_table(&report.rows));
            println!("{}", tally(&report.rows));
            match report.outcome {
                RunOutcome::Completed => {
                    println!("{} Run complete", style("✓").green().bold());
                    Ok(())
                }
                RunOutcome::Stopped { reason } => {
                    println!(
                        "{} {}. Continue with `autopilot run {} --resume`.",
                        style("■").yellow().bold(),
                        reason,
                        autopilot.config().intent
                    );
                    Ok(())
                }
                RunOutcome::Blocked { reason } => {
                    anyhow::bail!("Run blocked: {}", reason)
                }
            }
        }
        Err(failure) => {
            println!();
            println!("{}", render_table(&failure.report.rows));
            println!("{}", tally(&failure.report.rows));
            Err(anyhow::Error::new(failure).context("Autopilot run failed"))
        }
    }
}

pub async fn cmd_plan(
    project_dir: PathBuf,
    intent: &str,
    index: usize,
    candidates: Option<usize>,
    planner: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    let pilot = PilotConfig::new(project_dir)?;
    let mut config = RunConfig::from_pilot(intent, &pilot);
    if let Some(p) = planner {
        config.planner = p.parse()?;
    }
    if let Some(m) = model {
        config.model.model = Some(m.to_string());
    }
    let candidate_count = candidates.unwrap_or(config.candidate_count);

    let coordinator =
        Phase2Coordinator::new(PlannerChain::from_strategy(config.planner, config.model.clone()));
    let artifacts = JsonlLog::new(&config.paths.artifacts);

    let plan = match coordinator.build_plan(intent, index, candidate_count).await {
        Ok(plan) => plan,
        Err(AutopilotError::NoViablePlan {
            requested,
            artifacts: records,
        }) => {
            artifacts
                .append_all(&records)
                .context("Failed to write Phase-2 artifacts")?;
            anyhow::bail!(
                "No viable candidate out of {} (artifacts in {})",
                requested,
                artifacts.path().display()
            );
        }
        Err(e) => return Err(e.into()),
    };
    artifacts
        .append_all(&plan.artifacts)
        .context("Failed to write Phase-2 artifacts")?;

    for note in &plan.fallbacks {
        println!(
            "  {} {} fell back: {}",
            style("!").yellow(),
            note.planner,
            note.error
        );
    }

    let spec = &plan.planned.spec;
    println!(
        "{} candidate {} of {}",
        style("Selected").bold(),
        plan.selected,
        candidate_count.max(1)
    );
    println!("  Title:    {}", style(spec.display_title()).cyan());
    println!("  Profile:  {}", plan.planned.profile);
    println!("  Styles:   {}", spec.styles);
    if let (Some(w), Some(s)) = (spec.weirdness, spec.style_influence) {
        println!("  Tuning:   weirdness {}, style influence {}", w, s);
    }
    println!(
        "  Artifacts appended to {}",
        style(artifacts.path().display()).dim()
    );
    Ok(())
}
