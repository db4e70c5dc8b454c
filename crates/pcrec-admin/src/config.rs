use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "pcrec")]
#[command(
    author,
    version,
    about = "Administer the PC recommender configuration store"
)]
#[command(after_help = "Examples:
  pcrec serve
  pcrec sync
  pcrec publish --output app/public/data
  pcrec get rules")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Custom path to a config.toml with a [sync] table
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the periodic sync loop until interrupted
    #[command(after_help = "Interval and sources come from SYNC_INTERVAL_SECONDS, SYNC_ENABLED,
DATA_DIR and PUBLIC_DATA_DIR, or the [sync] table of the config file.")]
    Serve,
    /// Run one sync now and print its outcome
    Sync,
    /// Load components.json and rules.json into the store without publishing
    Seed,
    /// Write stored configs (falling back to the data directory) for static hosting
    #[command(after_help = "Examples:
  pcrec publish                          # Use PUBLIC_DATA_DIR
  pcrec publish --output app/public/data")]
    Publish {
        /// Target directory, overriding the configured publish location
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// List every stored config
    List,
    /// Print one stored config
    Get {
        /// Config key, e.g. "components" or "rules"
        key: String,
    },
    /// Replace a stored config with the JSON object in FILE
    Put {
        /// Config key to write
        key: String,
        /// Path to a JSON file holding an object
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Config::command().debug_assert();
    }

    #[test]
    fn test_parse_publish_with_output() {
        let config = Config::try_parse_from([
            "pcrec",
            "--database-url",
            "postgres://localhost/test",
            "publish",
            "--output",
            "public/data",
        ])
        .unwrap();

        match config.command {
            Command::Publish { output } => assert_eq!(output, Some(PathBuf::from("public/data"))),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_put() {
        let config = Config::try_parse_from([
            "pcrec",
            "--database-url",
            "postgres://localhost/test",
            "put",
            "rules",
            "rules.json",
        ])
        .unwrap();

        match config.command {
            Command::Put { key, file } => {
                assert_eq!(key, "rules");
                assert_eq!(file, PathBuf::from("rules.json"));
            }
            other => panic!("expected put, got {other:?}"),
        }
    }
}
