//! Progress reporting for sync runs.
//!
//! On a TTY each direction gets an indicatif bar that ticks per activity;
//! off-TTY (cron, CI) the same events become tracing lines.

use std::sync::Mutex;

use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};

use fitsync::sync::{ProgressCallback, SyncProgress};

/// Two-mode progress reporter.
pub struct Reporter {
    interactive: bool,
}

impl Reporter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interactive: Term::stdout().is_term(),
        }
    }

    /// Build the callback handed to the executor.
    #[must_use]
    pub fn callback(&self) -> ProgressCallback {
        if self.interactive {
            let bar: Mutex<Option<ProgressBar>> = Mutex::new(None);
            Box::new(move |event| handle_interactive(&bar, event))
        } else {
            Box::new(handle_logging)
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}")
        .expect("progress template is valid")
}

fn handle_interactive(slot: &Mutex<Option<ProgressBar>>, event: SyncProgress) {
    let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());

    match event {
        SyncProgress::DirectionStarted { direction } => {
            println!("{} {direction}", style("Syncing").bold());
        }
        SyncProgress::Listed { count, .. } => {
            if count > 0 {
                let bar = ProgressBar::new(count as u64).with_style(bar_style());
                *slot = Some(bar);
            }
        }
        SyncProgress::ProcessingActivity { name, index, .. } => {
            if let Some(bar) = slot.as_ref() {
                bar.set_message(name);
                bar.set_position(index.saturating_sub(1) as u64);
            }
        }
        SyncProgress::ActivityOutcome { state, .. } => {
            if let Some(bar) = slot.as_ref() {
                bar.inc(1);
                let _ = state;
            }
        }
        SyncProgress::RateLimitStop { retry_after, .. } => {
            if let Some(bar) = slot.take() {
                bar.abandon();
            }
            println!(
                "{}",
                style(format!(
                    "Rate limit reached, resuming in about {} min",
                    retry_after.num_minutes().max(1)
                ))
                .yellow()
            );
        }
        SyncProgress::DirectionFinished { counts, .. } => {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
            println!(
                "  {} synced, {} duplicate, {} skipped, {} failed, {} pending",
                counts.synced, counts.duplicate, counts.skipped, counts.failed, counts.pending
            );
        }
        SyncProgress::AmbiguousMatch {
            fingerprint,
            candidate,
            score,
        } => {
            println!(
                "  {}",
                style(format!(
                    "ambiguous match {fingerprint} ~ {candidate} (score {score:.2}), not linked"
                ))
                .dim()
            );
        }
        SyncProgress::Warning { message } => {
            println!("  {}", style(message).yellow());
        }
        _ => {}
    }
}

fn handle_logging(event: SyncProgress) {
    match event {
        SyncProgress::DirectionStarted { direction } => {
            tracing::info!(%direction, "Direction started");
        }
        SyncProgress::WindowSelected {
            direction,
            start,
            end,
            migration,
        } => {
            tracing::debug!(%direction, %start, %end, migration, "Window selected");
        }
        SyncProgress::Listed { direction, count } => {
            tracing::info!(%direction, count, "Activities listed");
        }
        SyncProgress::ActivityOutcome {
            fingerprint,
            state,
            reason,
        } => {
            tracing::info!(
                fingerprint = %fingerprint,
                state = %state,
                reason = reason.as_deref().unwrap_or(""),
                "Activity outcome"
            );
        }
        SyncProgress::AmbiguousMatch {
            fingerprint,
            candidate,
            score,
        } => {
            tracing::warn!(
                fingerprint = %fingerprint,
                candidate = %candidate,
                score,
                "Ambiguous match, not linked"
            );
        }
        SyncProgress::RateLimitStop {
            direction,
            retry_after,
        } => {
            tracing::warn!(%direction, retry_after_min = retry_after.num_minutes(), "Rate limit stop");
        }
        SyncProgress::DirectionFinished { direction, counts } => {
            tracing::info!(
                %direction,
                synced = counts.synced,
                duplicate = counts.duplicate,
                skipped = counts.skipped,
                failed = counts.failed,
                pending = counts.pending,
                "Direction finished"
            );
        }
        SyncProgress::Warning { message } => tracing::warn!(message = %message, "Sync warning"),
        _ => {}
    }
}
