use std::collections::BTreeMap;

use colored::Colorize;
use prettytable::{format, Table};
use serde::Serialize;

use crate::duration::{format_delta, format_hms};
use crate::error::Result;
use crate::runtime::{RuntimeSnapshot, RuntimeState, TimerRuntime};

/// Per-timer totals in a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerTotals {
    /// Banked elapsed seconds
    pub banked_seconds: u64,
    /// Manual offset
    pub offset_seconds: i64,
    /// Signed total, which can be negative
    pub total_seconds: i64,
    /// Total floored at zero
    pub display_seconds: u64,
}

/// Machine-readable status
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Whether the backend answered
    pub online: bool,
    /// Runtime snapshot
    #[serde(flatten)]
    pub snapshot: RuntimeSnapshot,
    /// Totals of every known timer
    pub totals: BTreeMap<String, TimerTotals>,
}

impl StatusReport {
    /// Build a report from a snapshot
    pub fn new(snapshot: RuntimeSnapshot, online: bool) -> Self {
        let totals = snapshot
            .known_timers()
            .into_iter()
            .map(|timer| {
                let totals = TimerTotals {
                    banked_seconds: snapshot.banked.get(&timer).copied().unwrap_or(0),
                    offset_seconds: snapshot.offset(&timer),
                    total_seconds: snapshot.total_seconds(&timer),
                    display_seconds: snapshot.display_seconds(&timer),
                };
                (timer, totals)
            })
            .collect();
        Self {
            online,
            snapshot,
            totals,
        }
    }
}

/// One-line description of the running clock
pub fn headline(snapshot: &RuntimeSnapshot) -> String {
    match &snapshot.state {
        RuntimeState::Idle => "Idle".yellow().to_string(),
        RuntimeState::Running { timer_id, .. } => {
            let mut line = format!(
                "{} {} {}",
                "Running".green().bold(),
                timer_id.cyan(),
                format_hms(snapshot.display_seconds(timer_id) as i64)
            );
            if snapshot.active_adjustment_seconds != 0 {
                line.push_str(&format!(
                    " ({} this session)",
                    format_delta(snapshot.active_adjustment_seconds)
                ));
            }
            line
        }
    }
}

/// Table of per-timer totals
pub fn totals_table(report: &StatusReport) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "Timer".bold(),
        "Banked".bold(),
        "Offset".bold(),
        "Total".bold()
    ]);

    for (timer, totals) in &report.totals {
        let name = if report.snapshot.state.is_running(timer) {
            timer.green().to_string()
        } else {
            timer.to_string()
        };
        table.add_row(prettytable::row![
            name,
            format_hms(totals.banked_seconds as i64),
            format_delta(totals.offset_seconds),
            format_hms(totals.display_seconds as i64)
        ]);
    }
    table
}

/// Refresh and print the current state
pub async fn run_status(runtime: &TimerRuntime, json: bool) -> Result<()> {
    let online = super::refresh_or_warn(runtime).await;
    runtime.tick();
    let report = StatusReport::new(runtime.snapshot(), online);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !online {
        println!("{}", "Offline: showing the last known state".red());
    }
    println!("{}", headline(&report.snapshot));
    if report.totals.is_empty() {
        println!("{}", "No timer history yet.".yellow());
    } else {
        println!();
        totals_table(&report).printstd();
    }
    Ok(())
}
