mod config;
mod render;
mod seed;

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    CampaignController, ControllerEvent, DonationOverlay, ExploreController, LoadOutcome,
    RenderState, ScrollLock, SupportersController,
};
use gateway::StoreGateway;
use shared::{
    domain::{CampaignId, SupporterId, UserId},
    protocol::NewDonation,
};
use storage::SqliteStore;
use tokio::sync::broadcast::Receiver;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "campaign", about = "Browse and support crowdfunding campaigns")]
struct Cli {
    /// Overrides the configured database url.
    #[arg(long)]
    database_url: Option<String>,
    /// Print failures as JSON error objects.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the demo campaigns into the store.
    Seed,
    Show {
        campaign_id: String,
    },
    Supporters {
        campaign_id: String,
    },
    Explore {
        #[arg(default_value = "")]
        term: String,
    },
    Donate {
        campaign_id: String,
        supporter_id: String,
        amount: u64,
        #[arg(long)]
        message: Option<String>,
        /// Display name used when this is the supporter's first donation.
        #[arg(long)]
        name: Option<String>,
    },
    Follow {
        campaign_id: String,
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::load_settings()?;
    if let Some(url) = &cli.database_url {
        settings.database_url = config::normalize_database_url(url);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(database_url = %settings.database_url, "cli: opening document store");
    let store = SqliteStore::open(&settings.database_url).await?;
    store.health_check().await?;

    let gateway = Arc::new(StoreGateway::with_retry_policy(
        store,
        settings.retry_policy(),
    ));
    let controller_settings = settings.controller_settings();

    let (text, failed) = match cli.command {
        Command::Seed => {
            let written = seed::seed_demo(gateway.store()).await?;
            (format!("seeded {written} campaigns\n"), false)
        }
        Command::Show { campaign_id } => {
            let controller = CampaignController::with_settings(gateway, controller_settings);
            controller.load(CampaignId::new(campaign_id)).await?;
            view(&controller.render_state(), render::campaign, cli.json)
        }
        Command::Supporters { campaign_id } => {
            let controller = SupportersController::with_settings(gateway, controller_settings);
            controller.load(CampaignId::new(campaign_id)).await?;
            view(&controller.render_state(), render::supporters, cli.json)
        }
        Command::Explore { term } => {
            let controller = ExploreController::with_settings(gateway, controller_settings);
            controller.search(&term).await?;
            view(
                &controller.render_state(),
                |found| render::search_results(&term, found),
                cli.json,
            )
        }
        Command::Donate {
            campaign_id,
            supporter_id,
            amount,
            message,
            name,
        } => {
            let controller = CampaignController::with_settings(gateway, controller_settings);
            let mut events = controller.subscribe_events();
            let mut overlay = DonationOverlay::new(ScrollLock::new());

            if controller.load(CampaignId::new(campaign_id)).await? == LoadOutcome::Ready {
                controller.open_donation_form();
                drain_form_events(&mut events, &mut overlay);

                let mut donation = NewDonation::new(SupporterId::new(supporter_id), amount);
                if let Some(message) = message {
                    donation = donation.with_message(message);
                }
                if let Some(name) = name {
                    donation = donation.with_supporter_name(name);
                }
                controller.donate(donation).await?;
                drain_form_events(&mut events, &mut overlay);
            }
            view(&controller.render_state(), render::campaign, cli.json)
        }
        Command::Follow {
            campaign_id,
            user_id,
        } => {
            let controller = CampaignController::with_settings(gateway, controller_settings);
            if controller.load(CampaignId::new(campaign_id)).await? == LoadOutcome::Ready {
                controller.follow(UserId::new(user_id)).await?;
            }
            view(&controller.render_state(), render::campaign, cli.json)
        }
    };

    print!("{text}");
    if failed {
        bail!("request failed");
    }
    Ok(())
}

fn view<T>(
    state: &RenderState<T>,
    ready: impl FnOnce(&T) -> String,
    json: bool,
) -> (String, bool) {
    match state {
        RenderState::Failed(failure) if json => {
            (format!("{}\n", render::failure_json(failure)), true)
        }
        RenderState::Failed(_) => (render::state(state, ready), true),
        _ => (render::state(state, ready), false),
    }
}

/// Mirrors the donation form onto the scroll lock, as a page would while the modal is up.
fn drain_form_events(events: &mut Receiver<ControllerEvent>, overlay: &mut DonationOverlay) {
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::DonationFormToggled { active } = event {
            overlay.sync(active);
            debug!(active, scroll_locked = overlay.is_open(), "cli: donation form toggled");
        }
    }
}
