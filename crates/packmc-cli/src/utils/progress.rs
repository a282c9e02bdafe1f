use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::fmt::Write;

/// Progress bar over Monte Carlo cycles, drawn on stderr.
pub struct CycleProgress {
    pb: ProgressBar,
}

impl CycleProgress {
    pub fn new(total_cycles: u64, hidden: bool) -> Self {
        let pb = ProgressBar::new(total_cycles).with_style(Self::bar_style());
        pb.set_draw_target(if hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        });
        pb.set_message("Sampling");
        Self { pb }
    }

    pub fn advance(&self, cycle: u64, status: String) {
        self.pb.set_position(cycle);
        self.pb.set_message(status);
    }

    /// Prints a line above the bar without disturbing it.
    pub fn println(&self, line: impl AsRef<str>) {
        self.pb.suspend(|| eprintln!("  {}", line.as_ref()));
    }

    pub fn finish(&self) {
        if let Some(length) = self.pb.length() {
            self.pb.set_position(length);
        }
        self.pb.finish_with_message("✓ Done");
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Failed to create bar style template")
            .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
            })
            .progress_chars("##-")
    }
}
