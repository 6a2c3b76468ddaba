use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use mdflow::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// The bar plus the name of the phase it currently displays.
struct Display {
    bar: ProgressBar,
    phase: &'static str,
}

/// Renders engine progress events on stderr: a spinner per phase, a step bar while integrating.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<Display>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(spinner_style())
            .with_message("Initializing...");
        bar.finish_and_clear();

        Self {
            display: Arc::new(Mutex::new(Display { bar, phase: "" })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = self.display.clone();
        Box::new(move |event: Progress| match display.lock() {
            Ok(mut display) => display.apply(event),
            Err(_) => warn!("Progress display mutex was poisoned. Dropping progress event."),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    fn apply(&mut self, event: Progress) {
        let bar = &self.bar;
        match event {
            Progress::PhaseStart { name } => {
                self.phase = name;
                bar.reset();
                bar.set_length(0);
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                bar.set_message(name);
            }
            Progress::PhaseFinish => {
                bar.disable_steady_tick();
                bar.finish_with_message(format!("✓ {}", self.phase));
            }
            Progress::TaskStart { total_steps } => {
                bar.disable_steady_tick();
                bar.reset();
                bar.set_length(total_steps);
                bar.set_style(bar_style());
                bar.set_message(self.phase);
            }
            Progress::TaskIncrement { steps } => bar.inc(steps),
            Progress::TaskFinish => {
                bar.set_position(bar.length().unwrap_or(0).max(bar.position()));
                bar.finish();
            }
            Progress::Energies {
                potential,
                kinetic,
                temperature,
                ..
            } => bar.set_message(format!(
                "{} E={:.3} T={:.1}K",
                self.phase,
                potential + kinetic,
                temperature
            )),
            Progress::Message(msg) if bar.is_finished() => bar.set_message(msg),
            Progress::Message(msg) => bar.println(format!("  {msg}")),
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<32} [{bar:40.cyan/blue}] {pos}/{len} steps ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("=>-")
}
