use colored::Colorize;

use crate::duration::{format_delta, format_hms, parse_delta};
use crate::error::Result;
use crate::runtime::TimerRuntime;

/// Start `timer_id`, switching away from whatever runs now
pub async fn run_start(runtime: &TimerRuntime, timer_id: &str) -> Result<()> {
    super::refresh_or_warn(runtime).await;
    let previous = runtime.state().timer_id().map(str::to_string);

    if previous.as_deref() == Some(timer_id) {
        println!("{} is already running", timer_id.cyan());
        return Ok(());
    }

    runtime.start_timer(timer_id).await?;

    match previous {
        Some(previous) => println!(
            "{} {} (stopped {})",
            "Started".green(),
            timer_id.cyan(),
            previous.cyan()
        ),
        None => println!("{} {}", "Started".green(), timer_id.cyan()),
    }
    Ok(())
}

/// Stop the running timer
pub async fn run_stop(runtime: &TimerRuntime) -> Result<()> {
    super::refresh_or_warn(runtime).await;
    runtime.tick();
    let snapshot = runtime.snapshot();

    runtime.stop_timer().await?;

    match snapshot.state.timer_id() {
        Some(timer_id) => println!(
            "{} {} at {}",
            "Stopped".green(),
            timer_id.cyan(),
            format_hms(snapshot.display_seconds(timer_id) as i64)
        ),
        None => println!("{}", "No timer was running".yellow()),
    }
    Ok(())
}

/// Apply a textual delta such as `-1m` to `timer_id`
///
/// Returns the applied amount, which may be smaller than requested when the
/// running timer's total would go below zero.
pub async fn run_adjust(runtime: &TimerRuntime, timer_id: &str, delta: &str) -> Result<i64> {
    let requested = parse_delta(delta)?;
    super::refresh_or_warn(runtime).await;

    let applied = runtime.adjust_offset(timer_id, requested);
    let snapshot = runtime.snapshot();

    if applied != requested {
        println!(
            "{} {} by {} (requested {}, limited by elapsed time)",
            "Adjusted".green(),
            timer_id.cyan(),
            format_delta(applied),
            format_delta(requested)
        );
    } else {
        println!(
            "{} {} by {}",
            "Adjusted".green(),
            timer_id.cyan(),
            format_delta(applied)
        );
    }
    println!(
        "Total now {}",
        format_hms(snapshot.display_seconds(timer_id) as i64)
    );
    Ok(applied)
}
