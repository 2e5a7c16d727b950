use anyhow::Result;
use clap::{Parser, Subcommand};

use git_autodeploy::cli::orchestration::{self, TagWorkflowArgs};
use git_autodeploy::config::{self, Config, RunContext};
use git_autodeploy::domain::Version;
use git_autodeploy::git::Git2Provider;
use git_autodeploy::pipeline::CancellationToken;
use git_autodeploy::{logging, ui};

#[derive(Parser)]
#[command(
    name = "git-autodeploy",
    version,
    about = "Coordinate component versions and auto-deploy tags across packager repositories"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(long, global = true, help = "Log mutations instead of performing them")]
    dry_run: bool,

    #[arg(long, global = true, help = "Use the security mirror of every project")]
    security: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    json_logs: bool,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every derived view of a version
    Version {
        #[arg(help = "Version string, e.g. 12.9.1-rc2-ee")]
        raw: String,
    },

    /// Print the auto-deploy branch name for a milestone
    BranchName {
        #[arg(long, help = "Milestone title, e.g. 12.9")]
        milestone: String,

        #[arg(long, help = "Branch date as YYYY-MM-DD (default: today)")]
        date: Option<String>,
    },

    /// Create an auto-deploy branch on the core project and every packager
    CreateBranch {
        #[arg(long, help = "Auto-deploy branch name")]
        branch: String,
    },

    /// Print the component versions of the core project at a commit
    Resolve {
        #[arg(long, help = "Core project commit id")]
        commit: String,
    },

    /// Propagate component versions and tag packagers
    Tag {
        #[arg(long, help = "Auto-deploy branch name")]
        branch: String,

        #[arg(long, help = "Core project commit id (default: branch head)")]
        commit: Option<String>,

        #[arg(long, default_value = "all", help = "omnibus, cng or all")]
        profile: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.json_logs, logging::level_for(args.verbose));

    // Pure commands need neither configuration nor repositories
    match &args.command {
        Command::Version { raw } => {
            let version = Version::parse(raw)?;
            ui::display_version(&version);
            return Ok(());
        }
        Command::BranchName { milestone, date } => {
            let branch = orchestration::branch_name(milestone, date.as_deref())?;
            println!("{}", branch);
            return Ok(());
        }
        _ => {}
    }

    let config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };
    let ctx = orchestration::build_context(&config, args.dry_run, args.security);
    if ctx.dry_run {
        ui::display_status("Dry run: no remote changes will be made");
    }

    let provider = Git2Provider::new(&config.repositories.root);
    run_command(args.command, &provider, ctx, &config)
}

fn run_command(command: Command, provider: &Git2Provider, ctx: RunContext, config: &Config) -> Result<()> {
    match command {
        Command::CreateBranch { branch } => {
            let results = orchestration::run_create_branch(provider, &ctx, &branch)?;
            ui::display_branch_results(&results);

            if results
                .iter()
                .any(|r| matches!(r.status, git_autodeploy::branch_service::BranchStatus::Failed(_)))
            {
                std::process::exit(1);
            }
        }
        Command::Resolve { commit } => {
            let versions = orchestration::run_resolve(provider, &ctx, &commit)?;
            ui::display_versions("Component versions", &versions.raw);
            ui::display_versions("Omnibus", &versions.omnibus);
            ui::display_versions("CNG", &versions.container);
        }
        Command::Tag {
            branch,
            commit,
            profile,
        } => {
            let args = TagWorkflowArgs {
                branch,
                commit,
                profile,
            };
            let report =
                orchestration::run_tag_workflow(provider, ctx, config, &args, &CancellationToken::new())?;
            ui::display_batch_report(&report);

            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Command::Version { .. } | Command::BranchName { .. } => {}
    }

    Ok(())
}
