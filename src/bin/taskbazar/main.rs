//! TaskBazar CLI
//!
//! Command-line client for the TaskBazar server.

mod client;
mod commands;
mod style;

use clap::{Parser, Subcommand};
use style::*;

use crate::client::{NewCampaign, Review, TaskBazarClient};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "taskbazar")]
#[command(version)]
#[command(about = "TaskBazar - spin, earn and run micro-task campaigns", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TaskBazar server URL
    #[arg(
        short,
        long,
        env = "TASKBAZAR_URL",
        default_value = "http://127.0.0.1:8080",
        global = true
    )]
    url: String,

    /// ID token used as the bearer credential
    #[arg(short, long, env = "TASKBAZAR_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spin the wheel (costs 5 points)
    #[command(visible_alias = "s")]
    Spin,

    /// Claim today's 10 point bonus
    #[command(visible_alias = "b")]
    Bonus,

    /// Create or delete campaigns
    #[command(subcommand)]
    Campaign(CampaignCommand),

    /// Approve or reject a worker's proof
    #[command(visible_alias = "r")]
    Review {
        #[arg(long)]
        task: String,
        #[arg(long)]
        submission: String,
        #[arg(long)]
        worker: String,
        /// Points paid to the worker on approval
        #[arg(long, default_value = "0")]
        reward: i64,
        /// "approved" pays the worker, anything else rejects
        #[arg(long, default_value = "approved")]
        status: String,
    },

    /// Apply a referral code
    Refer {
        code: String,
        /// Display name shown to the referrer
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Check server health
    #[command(visible_alias = "h")]
    Health,
}

#[derive(Subcommand)]
enum CampaignCommand {
    /// Fund and publish a new campaign
    Create {
        #[arg(long)]
        title: String,
        #[arg(long = "type", default_value = "website")]
        kind: String,
        #[arg(long)]
        link: String,
        /// Number of workers (at least 10)
        #[arg(long)]
        qty: i64,
        /// Points paid per approved proof
        #[arg(long)]
        reward: i64,
        /// Total points debited; defaults to qty * reward
        #[arg(long)]
        total_cost: Option<i64>,
    },

    /// Delete a campaign and refund points
    Delete {
        task: String,
        #[arg(long, default_value = "0")]
        refund: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Explicit `--total-cost`, else `qty * reward` when that fits.
fn campaign_cost(qty: i64, reward: i64, total_cost: Option<i64>) -> Option<i64> {
    total_cost.or_else(|| qty.checked_mul(reward))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("info").init();
        println!("{}", style_dim(&format!("taskbazar v{} -> {}", VERSION, cli.url)));
    }

    let client = TaskBazarClient::new(&cli.url, cli.token);

    let result = match cli.command {
        Commands::Spin => commands::points::spin(&client).await,
        Commands::Bonus => commands::points::bonus(&client).await,
        Commands::Campaign(CampaignCommand::Create {
            title,
            kind,
            link,
            qty,
            reward,
            total_cost,
        }) => {
            let Some(total_cost) = campaign_cost(qty, reward, total_cost) else {
                print_error("--qty times --reward is too large; pass --total-cost");
                std::process::exit(1);
            };
            let campaign = NewCampaign {
                title,
                kind,
                link,
                qty,
                total_cost,
                reward,
            };
            commands::campaign::create(&client, campaign).await
        }
        Commands::Campaign(CampaignCommand::Delete { task, refund, yes }) => {
            commands::campaign::delete(&client, &task, refund, yes).await
        }
        Commands::Review {
            task,
            submission,
            worker,
            reward,
            status,
        } => {
            let review = Review {
                task_id: task,
                sub_id: submission,
                worker_id: worker,
                reward_points: reward,
                new_status: status,
            };
            commands::campaign::review(&client, review).await
        }
        Commands::Refer { code, name } => commands::referral::run(&client, &code, &name).await,
        Commands::Health => commands::health::run(&client).await,
    };

    if let Err(e) = result {
        print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
