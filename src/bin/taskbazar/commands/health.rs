//! Health command - check the server is up

use anyhow::Result;

use crate::client::TaskBazarClient;
use crate::style::*;

pub async fn run(client: &TaskBazarClient) -> Result<()> {
    print_header("Server Health");

    let health = client.health().await?;
    if health.healthy {
        print_success("Server is healthy");
    } else {
        print_warning("Server reports unhealthy");
    }
    println!("Version:  {}", style_cyan(&health.version));
    println!("Store:    {}", health.store);
    println!("Uptime:   {}s", health.uptime_secs);
    Ok(())
}
