//! Terminal output for people, as opposed to the structured log.
//!
//! # Examples
//!
//! ```no_run
//! use tern_cli::ui;
//!
//! ui::init_colors(false);
//! ui::success("Listening on http://localhost:5000");
//! ui::warning("index.html not found");
//! ```

mod format;
mod messages;

use std::sync::atomic::{AtomicBool, Ordering};

pub use format::format_duration;
pub use messages::{info, success, warning};

static COLORS: AtomicBool = AtomicBool::new(true);

/// Check if color output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` enables them even when stderr
/// is not a terminal.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::user_attended_stderr()
}

/// Decide once whether status messages are colored.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

pub(crate) fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}
