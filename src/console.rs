//! Colorful console output for the routing pipeline (§4.7, demo binary).

use std::time::{Duration, Instant};

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;

use crate::model::RoutingResponse;

/// ASCII art banner for the demo binary.
pub fn print_banner() {
    let banner = r#"
 _____              ____  _               ____             _   _
|_   _|_      _____/ ___|| |_ ___ _ __   |  _ \ ___  _   _| |_(_)_ __   __ _
  | | \ \ /\ / / _ \\___ \| __/ _ \ '_ \  | |_) / _ \| | | | __| | '_ \ / _` |
  | |  \ V  V /  __/ ___) | ||  __/ |_) | |  _ < (_) | |_| | |_| | | | | (_| |
  |_|   \_/\_/ \___|____/ \__\___| .__/  |_| \_\___/ \__,_|\__|_|_| |_|\__, |
                                  |_|                                   |___/
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "decomposition/recomposition routing".bright_cyan()
    );
}

/// Prints a phase start message.
pub fn print_phase_start(phase_name: &str, phase_index: usize) {
    println!(
        "{} {} {} {} phase ({}) started",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{phase_name}]").bright_cyan(),
        phase_name.white().bold(),
        phase_index.to_string().yellow()
    );
}

/// Prints a phase end message with an elapsed time and a free-form detail.
pub fn print_phase_end(phase_name: &str, phase_index: usize, elapsed: Duration, detail: &str) {
    println!(
        "{} {} {} {} phase ({}) ended: time spent ({}), {}",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{phase_name}]").bright_cyan(),
        phase_name.white().bold(),
        phase_index.to_string().yellow(),
        format_duration(elapsed).yellow(),
        detail
    );
}

/// Prints problem scale before the pipeline starts.
pub fn print_config(shipments: usize, vehicles: usize, parking_locations: usize) {
    println!(
        "{} {} {} problem: shipments ({}), vehicles ({}), parking locations ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Planner]".bright_cyan(),
        shipments.to_formatted_string(&Locale::en).bright_yellow(),
        vehicles.to_formatted_string(&Locale::en).bright_yellow(),
        parking_locations.to_formatted_string(&Locale::en).bright_yellow()
    );
}

/// Prints a boxed summary of a final merged routing response.
pub fn print_plan_summary(response: &RoutingResponse) {
    let used_vehicles = response.routes.iter().filter(|r| r.is_non_empty()).count();
    let total_visits: usize = response.routes.iter().map(|r| r.visits.len()).sum();
    let total_cost: f64 = response.routes.iter().map(|r| r.route_total_cost).sum();
    let skipped = response.skipped_shipments.len();

    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════╗".bright_cyan());

    let status_text = if skipped == 0 { "✓ ALL SHIPMENTS SERVED" } else { "⚠ SOME SHIPMENTS SKIPPED" };
    let status_colored = if skipped == 0 {
        status_text.bright_green().bold().to_string()
    } else {
        status_text.bright_yellow().bold().to_string()
    };
    let padding = 56usize.saturating_sub(status_text.chars().count());
    let left_pad = padding / 2;
    let right_pad = padding - left_pad;
    println!("{}{}{}{}{}", "║".bright_cyan(), " ".repeat(left_pad), status_colored, " ".repeat(right_pad), "║".bright_cyan());

    println!("{}", "╠══════════════════════════════════════════════════════════╣".bright_cyan());
    print_summary_row("Vehicles Used:", &used_vehicles.to_string());
    print_summary_row("Total Visits:", &total_visits.to_string());
    print_summary_row("Skipped Shipments:", &skipped.to_string());
    print_summary_row("Total Cost:", &format!("{total_cost:.2}"));
    println!("{}", "╚══════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

fn print_summary_row(label: &str, value: &str) {
    println!("{}  {:<18}{:>36}  {}", "║".bright_cyan(), label, value, "║".bright_cyan());
}

fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let mins = total_ms / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        format!("{mins}m {secs}s")
    }
}

fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
        .unwrap_or_else(|_| "0.000".to_string())
}

/// A timer for tracking how long a pipeline phase takes to build.
pub struct PhaseTimer {
    start: Instant,
    phase_name: String,
    phase_index: usize,
}

impl PhaseTimer {
    pub fn start(phase_name: impl Into<String>, phase_index: usize) -> Self {
        let name = phase_name.into();
        print_phase_start(&name, phase_index);
        Self { start: Instant::now(), phase_name: name, phase_index }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self, detail: &str) {
        print_phase_end(&self.phase_name, self.phase_index, self.start.elapsed(), detail);
    }
}
