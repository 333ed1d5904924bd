//! Referral command

use anyhow::Result;

use crate::client::TaskBazarClient;
use crate::style::*;

pub async fn run(client: &TaskBazarClient, code: &str, name: &str) -> Result<()> {
    print_header("Apply Referral Code");

    client.referral(code, name).await?;
    print_success(&format!("Referral code {} applied", style_cyan(code)));
    print_info("The code's owner received 50 points. A referral can only be applied once.");
    Ok(())
}
