mod commands;
mod terminal;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bff",
    about = "Scaffold Backend-For-Frontend projects and deploy them to Cloud Run"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render templates and set up the local environment
    Init {
        /// Also provision the service account, CI secret and image on GCP
        #[arg(long)]
        admin: bool,
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
        /// GCP region
        #[arg(long)]
        region: Option<String>,
        /// GCP project ID
        #[arg(long)]
        gcp_project_id: Option<String>,
        /// Skip every frontend step
        #[arg(long)]
        skip_frontend: bool,
        /// Skip the frontend production build
        #[arg(long)]
        skip_frontend_build: bool,
        /// Skip the backend dependency install
        #[arg(long)]
        skip_backend: bool,
    },
    /// Build and push the image, then deploy to Google Cloud Run
    Deploy {
        /// Region for this deploy only
        #[arg(long)]
        region: Option<String>,
        /// Extra arguments passed to `gcloud run deploy`
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Show provisioning state and the latest deployment
    Status {
        /// Also show recent operations
        #[arg(long, short = 'v')]
        verbose: bool,
    },
    /// List deployments, most recent first
    History {
        /// Number of entries to show
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Show the operations log instead of deployments
        #[arg(long)]
        operations: bool,
    },
    /// Delete cloud resources, the GitHub repository, local images and the project
    Clean {
        /// Keep the local project directory
        #[arg(long)]
        skip_local: bool,
        /// Do not clone a fresh template into the deleted directory
        #[arg(long)]
        no_template: bool,
    },
    /// Read or change the deployment target
    Config(ConfigArgs),
    /// Manage the project service account
    ServiceAccount {
        #[command(subcommand)]
        action: AccountCommand,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ConfigArgs {
    /// Print one value
    #[arg(long, value_name = "KEY")]
    get: Option<String>,
    /// Change one value
    #[arg(long, value_name = "KEY=VALUE")]
    set: Option<String>,
    /// Print every value
    #[arg(long)]
    list: bool,
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Create the service account if it does not exist
    Create,
    /// Delete the service account
    Delete {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Bind IAM roles (default: the provisioning role set)
    AddPermissions {
        /// Roles, e.g. run.admin or roles/run.admin
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        roles: Vec<String>,
    },
    /// Remove IAM role bindings (default: the provisioning role set)
    RemovePermissions {
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        roles: Vec<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            admin,
            name,
            region,
            gcp_project_id,
            skip_frontend,
            skip_frontend_build,
            skip_backend,
        } => {
            commands::init(bff::init::InitOptions {
                admin,
                name,
                region,
                gcp_project_id,
                skip_frontend,
                skip_frontend_build,
                skip_backend,
            })
            .await?
        }
        Commands::Deploy { region, args } => {
            commands::deploy(bff::deploy::DeployOptions {
                region,
                extra_args: args,
            })
            .await?
        }
        Commands::Status { verbose } => commands::status(verbose)?,
        Commands::History {
            limit,
            json,
            operations,
        } => commands::history(limit, json, operations)?,
        Commands::Clean {
            skip_local,
            no_template,
        } => commands::clean(skip_local, !no_template).await?,
        Commands::Config(args) => match (args.get, args.set, args.list) {
            (Some(key), _, _) => commands::config_get(&key)?,
            (_, Some(assignment), _) => commands::config_set(&assignment)?,
            _ => commands::config_list()?,
        },
        Commands::ServiceAccount { action } => match action {
            AccountCommand::Create => commands::service_account_create().await?,
            AccountCommand::Delete { yes } => commands::service_account_delete(yes).await?,
            AccountCommand::AddPermissions { roles } => {
                commands::service_account_add_permissions(roles).await?
            }
            AccountCommand::RemovePermissions { roles, yes } => {
                commands::service_account_remove_permissions(roles, yes).await?
            }
        },
    }

    Ok(())
}
