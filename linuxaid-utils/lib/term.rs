//! Module containing terminal utilities

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Determines if stderr is attached to a terminal that understands ANSI escape codes.
///
/// Systemd timers and cron jobs get plain text.
pub fn is_ansi_stderr() -> bool {
    let stderr_is_tty = unsafe { libc::isatty(libc::STDERR_FILENO) == 1 };
    let has_term = std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false);

    if stderr_is_tty && !has_term {
        tracing::debug!("detected TTY without usable TERM environment variable");
    }

    stderr_is_tty && has_term
}
