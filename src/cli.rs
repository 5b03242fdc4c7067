use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Instrument};

use crate::agents::claude::ClaudeCli;
use crate::config;
use crate::health::{self, HealthScope};
use crate::logging;
use crate::model::agent::make_adw_id;
use crate::model::work_item::Platform;
use crate::providers::{self, AdapterOptions};
use crate::webhook;
use crate::workflow::Workflow;

#[derive(Debug, Parser)]
#[command(
    name = "adw",
    version,
    about = "Plan, implement and open a pull request for a GitHub issue or ClickUp task",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// GitHub issue number (shorthand for `adw run --issue`)
    pub issue: Option<String>,

    /// Correlation id for the shorthand form
    pub adw_id: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the plan & build workflow for one work item
    Run(RunArgs),
    /// Serve the ClickUp webhook trigger
    Webhook {
        /// Listen port (defaults to PORT or 8001)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Check configuration, tooling and API access
    Health(HealthArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, default_value = "github")]
    pub platform: Platform,

    /// GitHub issue number
    #[arg(long)]
    pub issue: Option<String>,

    /// ClickUp task id
    #[arg(long)]
    pub task_id: Option<String>,

    #[arg(long)]
    pub adw_id: Option<String>,
}

#[derive(Debug, Args)]
pub struct HealthArgs {
    #[arg(long, value_enum, default_value = "both")]
    pub platform: HealthScope,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// GitHub issue to post the verdict to
    pub issue: Option<String>,
}

/// What a workflow invocation operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    pub platform: Platform,
    pub item_id: String,
    pub adw_id: Option<String>,
}

impl RunArgs {
    pub fn target(self) -> Result<RunTarget> {
        let item_id = match self.platform {
            Platform::GitHub => self.issue,
            Platform::ClickUp => self.task_id,
        };
        let Some(item_id) = item_id.filter(|id| !id.trim().is_empty()) else {
            match self.platform {
                Platform::GitHub => bail!("--issue is required for --platform github"),
                Platform::ClickUp => bail!("--task-id is required for --platform clickup"),
            }
        };
        Ok(RunTarget {
            platform: self.platform,
            item_id,
            adw_id: self.adw_id,
        })
    }
}

impl Cli {
    /// The shorthand `adw <issue> [adw_id]` form, always against GitHub.
    pub fn legacy_target(self) -> Option<RunTarget> {
        self.issue.map(|item_id| RunTarget {
            platform: Platform::GitHub,
            item_id,
            adw_id: self.adw_id,
        })
    }
}

/// Run one workflow. Logs go to stdout and the run's execution log.
pub async fn handle_run(target: RunTarget) -> Result<()> {
    let config = config::load_config()?;
    let adw_id = target.adw_id.clone().unwrap_or_else(make_adw_id);
    let log_path = logging::init_for_run(&config.agent.agents_dir, &adw_id)?;

    let span = tracing::info_span!("adw", adw_id = %adw_id, platform = %target.platform);
    async move {
        info!(log = %log_path.display(), "ADW ID: {adw_id}");
        if let Err(e) = config.require_run_vars(target.platform) {
            error!(error = %e, "Configuration incomplete");
            return Err(anyhow::Error::from(e));
        }

        let adapter =
            providers::create_adapter(target.platform, &config, AdapterOptions::default()).await?;
        let agent = ClaudeCli::new(&config);
        Workflow::new(adapter.as_ref(), &agent, &adw_id)
            .run(&target.item_id)
            .await?;
        anyhow::Ok(())
    }
    .instrument(span)
    .await
}

pub async fn handle_webhook(port: Option<u16>) -> Result<()> {
    logging::init_stdout();
    let config = config::load_config()?;
    let port = port.unwrap_or(config.webhook.port);
    webhook::serve(&config, port).await
}

/// Returns whether the system is healthy.
pub async fn handle_health(args: HealthArgs) -> Result<bool> {
    if args.json {
        logging::init_stderr();
    } else {
        logging::init_stdout();
    }
    let config = config::load_config()?;
    let report = health::run_health_check(&config, args.platform).await;

    if args.json {
        health::print_json(&report)?;
    } else {
        health::print_report(&report, args.platform);
    }

    if let Some(issue) = args.issue {
        let comment = format!(
            "{} Health check completed: {}",
            if report.success { "✅" } else { "❌" },
            health::verdict(&report)
        );
        let posted = async {
            let adapter =
                providers::create_adapter(Platform::GitHub, &config, AdapterOptions::default())
                    .await?;
            adapter.add_comment(&issue, &comment).await?;
            anyhow::Ok(())
        }
        .await;
        match posted {
            Ok(()) => info!(issue = %issue, "Posted health check comment"),
            Err(e) => error!(issue = %issue, error = %format!("{e:#}"), "Failed to post comment"),
        }
    }

    Ok(report.success)
}
