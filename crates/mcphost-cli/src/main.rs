//! CLI entry point.

use clap::{CommandFactory, Parser};
use mcphost_cli::handlers::{self, add::AddArgs};
use mcphost_cli::{
    Cli, CliConfig, CliError, Commands, bootstrap, error::exit_code_for, init_logging,
};
use mcphost_core::HostSettings;

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = HostSettings::from_env().map_err(CliError::from)?;
    init_logging(cli.verbose, settings.log_level.as_deref());

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::new(cli.config, cli.root, settings)?;
    let mut ctx = bootstrap(config).await?;

    match command {
        Commands::Servers => handlers::servers::execute(&ctx).await?,
        Commands::Add {
            id,
            command,
            args,
            env,
            name,
            cwd,
            path_extra,
            description,
            category,
            disabled,
            force,
        } => {
            let args = AddArgs {
                id,
                command,
                args,
                env,
                name,
                cwd,
                path_extra,
                description,
                category,
                disabled,
                force,
            };
            handlers::add::execute(&mut ctx, args)?;
        }
        Commands::Remove { id } => handlers::remove::execute(&mut ctx, &id)?,
        Commands::Tools { server, json } => {
            handlers::tools::execute(&ctx, server.as_deref(), json).await?;
        }
        Commands::Call { tool, args } => {
            handlers::call::execute(&ctx, &tool, args.as_deref()).await?;
        }
        Commands::Check => handlers::check::execute(&ctx).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}
