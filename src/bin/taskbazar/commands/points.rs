//! Spin and daily bonus commands

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::client::TaskBazarClient;
use crate::style::*;

/// Wheel labels in slot order, matching the server's prize table.
const WHEEL: [&str; 8] = ["0", "2", "5", "10", "20", "0", "50", "5"];

pub async fn spin(client: &TaskBazarClient) -> Result<()> {
    print_header("Spin the Wheel");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Spinning (costs 5 points)...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let result = client.spin().await;
    spinner.finish_and_clear();
    let outcome = result?;

    let wheel: Vec<String> = WHEEL
        .iter()
        .enumerate()
        .map(|(i, label)| {
            if i == outcome.prize_index {
                style_bold(&style_yellow(&format!("[{}]", label)))
            } else {
                style_dim(label)
            }
        })
        .collect();
    println!("{}", wheel.join("  "));
    println!();

    if outcome.win_amount > 0 {
        print_success(&format!("You won {} points!", outcome.win_amount));
    } else {
        print_warning("No prize this time.");
    }
    println!("Net:      {}", style_delta(outcome.win_amount - 5));
    println!("Balance:  {}", style_bold(&outcome.new_points.to_string()));
    Ok(())
}

pub async fn bonus(client: &TaskBazarClient) -> Result<()> {
    print_header("Daily Bonus");

    let outcome = client.daily_bonus().await?;
    print_success(&outcome.message);
    println!("Balance:  {}", style_bold(&outcome.new_points.to_string()));
    Ok(())
}
