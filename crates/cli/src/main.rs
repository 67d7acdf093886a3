use anyhow::Context;
use bookstore_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Bookstore service control
#[derive(Debug, Parser)]
#[command(name = "bookstore-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and serve the HTTP API until interrupted
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookstore settings")?;

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Command::Migrate => {
            bookstore_telemetry::init(&settings.telemetry)?;
            let applied = bookstore_app::app::migrate(settings).await?;
            tracing::info!(applied, "migrations complete");
            println!("applied {applied} migration(s)");
        }
        Command::Serve => {
            bookstore_telemetry::init(&settings.telemetry)?;
            bookstore_app::app::run(settings).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["bookstore-cli"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["bookstore-cli", "migrate"]).unwrap().command,
            Command::Migrate
        ));
    }
}
