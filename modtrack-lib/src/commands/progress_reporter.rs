use crate::history::Progress;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

type Snapshot = Box<dyn Fn() -> (u64, u64, String) + Send + Sync>;

const TICK: Duration = Duration::from_millis(100);

const BAR_TEMPLATE: &str = "{prefix:>12.bold.cyan} [{bar:25}] {pos}/{len} {msg}";
const BAR_TEMPLATE_PLAIN: &str = "{prefix:>12} [{bar:25}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{prefix:>12.bold.cyan} {spinner} {elapsed} {msg}";
const SPINNER_TEMPLATE_PLAIN: &str = "{prefix:>12} {spinner} {elapsed} {msg}";

/// Shared between the reporter and its refresh task.
struct Shared {
    show_after: Instant,
    shown: AtomicBool,
    poll: Mutex<Snapshot>,
}

/// Terminal progress for history runs.
///
/// The bar stays hidden for short runs and only appears once `delay` has passed.
/// A background task polls the current callback ten times a second.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    shared: Arc<Shared>,
    refresher: Arc<JoinHandle<()>>,
    use_colors: bool,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        let shared = Arc::new(Shared {
            show_after: Instant::now() + delay,
            shown: AtomicBool::new(false),
            poll: Mutex::new(Box::new(|| (0, 0, String::new()))),
        });

        Self {
            refresher: Arc::new(tokio::spawn(refresh(bar.clone(), Arc::clone(&shared)))),
            bar,
            shared,
            use_colors,
        }
    }

    fn style(&self, colored: &str, plain: &str, spinner: bool) -> ProgressStyle {
        let template = if self.use_colors { colored } else { plain };
        let base = if spinner { ProgressStyle::default_spinner() } else { ProgressStyle::default_bar() };
        base.template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

impl Progress for ProgressReporter {
    fn set_phase(&self, phase: &str) {
        self.bar.set_prefix(phase.to_string());
    }

    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {
        *self.shared.poll.lock().expect("lock not poisoned") = callback;
        self.bar.disable_steady_tick();
        self.bar.set_style(self.style(BAR_TEMPLATE, BAR_TEMPLATE_PLAIN, false));
        self.bar.set_length(0);
        self.bar.set_position(0);
    }

    fn set_indeterminate(&self, callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {
        *self.shared.poll.lock().expect("lock not poisoned") = Box::new(move || (0, 0, callback()));
        self.bar.set_style(self.style(SPINNER_TEMPLATE, SPINNER_TEMPLATE_PLAIN, true));
        self.bar.reset_elapsed();
        self.bar.enable_steady_tick(TICK);
    }

    fn println(&self, msg: &str) {
        self.bar.suspend(|| eprintln!("{msg}"));
    }

    fn done(&self) {
        self.refresher.abort();
        if self.shared.shown.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("shown", &self.shared.shown)
            .field("use_colors", &self.use_colors)
            .finish_non_exhaustive()
    }
}

async fn refresh(bar: ProgressBar, shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(TICK);

    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        let _ = interval.tick().await;

        if !shared.shown.load(Ordering::Relaxed) {
            if Instant::now() < shared.show_after {
                continue;
            }

            shared.shown.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        let (len, pos, msg) = {
            let poll = shared.poll.lock().expect("lock not poisoned");
            poll()
        };

        if len > 0 {
            bar.set_length(len);
            bar.set_position(pos);
        }

        bar.set_message(msg);
    }
}
