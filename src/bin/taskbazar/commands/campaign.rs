//! Campaign commands - create, delete and review

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm};

use crate::client::{NewCampaign, Review, TaskBazarClient};
use crate::style::*;

pub async fn create(client: &TaskBazarClient, campaign: NewCampaign) -> Result<()> {
    print_header("Create Campaign");

    println!("Title:    {}", style_cyan(&campaign.title));
    println!("Type:     {}", campaign.kind);
    println!("Link:     {}", style_dim(&campaign.link));
    println!("Workers:  {}", campaign.qty);
    println!("Reward:   {} points each", campaign.reward);
    println!("Cost:     {}", style_delta(-campaign.total_cost));
    println!();

    client.create_campaign(&campaign).await?;
    print_success("Campaign published");
    Ok(())
}

pub async fn delete(
    client: &TaskBazarClient,
    task_id: &str,
    refund_points: i64,
    yes: bool,
) -> Result<()> {
    print_header("Delete Campaign");

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Delete {} and refund {} points?",
                task_id, refund_points
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            print_info("Cancelled.");
            return Ok(());
        }
    }

    client.delete_campaign(task_id, refund_points).await?;
    print_success(&format!("Campaign {} deleted", style_cyan(task_id)));
    if refund_points > 0 {
        println!("Refund:   {}", style_delta(refund_points));
    }
    Ok(())
}

pub async fn review(client: &TaskBazarClient, review: Review) -> Result<()> {
    print_header("Review Proof");

    client.review_proof(&review).await?;
    if review.new_status == "approved" {
        print_success(&format!(
            "Approved {} for worker {} ({})",
            review.sub_id,
            style_cyan(&review.worker_id),
            style_delta(review.reward_points)
        ));
    } else {
        print_warning(&format!(
            "Marked {} as {} for worker {}",
            review.sub_id,
            review.new_status,
            style_cyan(&review.worker_id)
        ));
    }
    Ok(())
}
