use std::sync::{Arc, Mutex};

use colored::Colorize;

use crate::commands::status::headline;
use crate::error::Result;
use crate::runtime::{RuntimeSnapshot, TimerRuntime};

/// Follow the runtime, printing a line whenever the headline changes
///
/// Runs the tick and poll tasks until Ctrl-C, then disposes the runtime.
pub async fn run_watch(runtime: &TimerRuntime) -> Result<()> {
    let last_line = Arc::new(Mutex::new(String::new()));
    let printer = {
        let last_line = Arc::clone(&last_line);
        move |snapshot: &RuntimeSnapshot| {
            if snapshot.loading {
                return;
            }
            let line = headline(snapshot);
            let mut last = last_line.lock().unwrap_or_else(|e| e.into_inner());
            if *last != line {
                println!("{}", line);
                *last = line;
            }
        }
    };
    let listener = runtime.subscribe(printer);

    println!("{}", "Watching timers; press Ctrl-C to stop.".dimmed());
    runtime.spawn_background();

    let result = tokio::signal::ctrl_c().await;

    runtime.dispose();
    runtime.unsubscribe(listener);
    tracing::debug!("Watch ended");
    result?;
    Ok(())
}
