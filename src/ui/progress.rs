use crate::orchestrator::state::JobPhase;
use crate::ui::icons::{BLOCKER, CHECK, CLOCK, CROSS, PLAN, RESUME, SPARKLE, STOP};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Terminal UI for an autopilot run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Job bar: how many jobs have finished (completed or abandoned)
/// - Step spinner: the current phase and live status
pub struct PilotUI {
    multi: MultiProgress,
    job_bar: ProgressBar,
    step_bar: ProgressBar,
    verbose: bool,
    current_job: AtomicUsize,
}

impl PilotUI {
    /// Create the UI for a run of `total_jobs` jobs.
    pub fn new(total_jobs: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let job_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");

        let job_bar = multi.add(ProgressBar::new(total_jobs));
        job_bar.set_style(job_style);
        job_bar.set_prefix("  Jobs");

        let step_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let step_bar = multi.add(ProgressBar::new_spinner());
        step_bar.set_style(step_style);
        step_bar.set_prefix("  Step");

        Self {
            multi,
            job_bar,
            step_bar,
            verbose,
            current_job: AtomicUsize::new(0),
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!`.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Jobs already finished before this process started (resumed runs).
    pub fn set_finished(&self, finished: u64) {
        self.job_bar.set_position(finished);
    }

    /// Announce job `number` (1-based).
    pub fn start_job(&self, number: usize, total: usize) {
        self.current_job.store(number, Ordering::SeqCst);
        self.job_bar
            .set_message(format!("job {}/{}", style(number).yellow(), total));
    }

    /// Show the phase about to run and start the spinner.
    pub fn start_phase(&self, phase: JobPhase, title: Option<&str>) {
        let job = self.current_job.load(Ordering::SeqCst);
        let label = match title {
            Some(t) => format!("{} {}", style(phase).cyan(), style(t).dim()),
            None => format!("{}", style(phase).cyan()),
        };
        self.step_bar.set_message(format!("job {} {}", job, label));
        self.step_bar.enable_steady_tick(Duration::from_millis(100));
    }

    /// Update the spinner with a short status; printed too when verbose.
    pub fn log_step(&self, msg: &str) {
        let job = self.current_job.load(Ordering::SeqCst);
        self.step_bar
            .set_message(format!("job {} {}", job, style(format!("({})", msg)).dim()));
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    pub fn show_plan(&self, title: &str, profile: &str, planner: &str) {
        self.print_line(format!(
            "    {} {} {}",
            PLAN,
            style(title).bold(),
            style(format!("(profile {}, planner {})", profile, planner)).dim()
        ));
    }

    pub fn show_waiting(&self, seconds: u64) {
        if seconds > 0 {
            self.log_step(&format!("{}waiting {}s", CLOCK, seconds));
        }
    }

    pub fn attempt_failed(&self, phase: JobPhase, attempt: u32, max: u32, msg: &str) {
        self.print_line(format!(
            "    {} {} attempt {}/{} failed: {}",
            CROSS,
            phase,
            attempt,
            max,
            style(msg).red()
        ));
    }

    /// Show the operator what to do while the run is paused.
    pub fn show_pause(&self, reason: &str, instruction: &str) {
        self.step_bar.set_message(format!(
            "{} {}",
            BLOCKER,
            style("paused: waiting for resume signal").red().bold()
        ));
        self.print_line(format!(
            "\n{} {}",
            BLOCKER,
            style(format!("BLOCKED: {}", reason)).red().bold()
        ));
        self.print_line(format!("   {}\n", style(instruction).yellow()));
    }

    pub fn show_resumed(&self) {
        self.print_line(format!("    {} Resume signal received", RESUME));
    }

    /// Count a finished job and print its banner.
    pub fn job_complete(&self, number: usize, title: &str) {
        self.job_bar.inc(1);
        self.print_line(format!(
            "{} Job {} complete: {}",
            SPARKLE,
            style(number).green().bold(),
            title
        ));
    }

    /// Count an abandoned job.
    pub fn job_failed(&self, number: usize, phase: JobPhase, reason: &str) {
        self.job_bar.inc(1);
        self.print_line(format!(
            "{} Job {} failed at {}: {}",
            CROSS,
            style(number).red().bold(),
            phase,
            reason
        ));
    }

    pub fn show_stopped(&self, reason: &str) {
        self.print_line(format!("{} {}", STOP, style(reason).yellow().bold()));
    }

    /// Stop both bars.
    pub fn finish(&self, msg: &str, completed: bool) {
        self.step_bar.finish_and_clear();
        let msg = if completed {
            format!("{} {}", CHECK, style(msg).green())
        } else {
            format!("{} {}", STOP, style(msg).yellow())
        };
        self.job_bar.finish_with_message(msg);
    }
}
