use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "backitup")]
#[command(about = "Run rsync backups from named schemas, one at a time", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to <config dir>/BackItUp/settings.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all schemas and whether their paths exist
    #[command(alias = "ls")]
    List,

    /// Show one schema
    Show { name: String },

    /// Create or update a schema
    Save {
        name: String,

        /// Source path (repeatable, order is kept)
        #[arg(short, long = "source", required = true)]
        sources: Vec<String>,

        /// Destination directory
        #[arg(short, long = "dest")]
        destination: String,

        /// Overwrite an existing schema with the same name
        #[arg(short, long)]
        force: bool,
    },

    /// Delete a schema
    #[command(alias = "rm")]
    Delete { name: String },

    /// Check that every path of a schema exists
    Validate { name: String },

    /// Queue schemas in order and run them until the queue is empty
    Run {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_save() {
        let cli = Cli::try_parse_from([
            "backitup", "save", "docs", "--source", "/a", "-s", "/b", "--dest", "/mnt",
        ])
        .unwrap();
        match cli.command {
            Commands::Save {
                name,
                sources,
                destination,
                force,
            } => {
                assert_eq!(name, "docs");
                assert_eq!(sources, vec!["/a", "/b"]);
                assert_eq!(destination, "/mnt");
                assert!(!force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_with_global_flags() {
        let cli = Cli::try_parse_from(["backitup", "run", "a", "b", "--json", "-v"]).unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run { names } if names == ["a", "b"]));
    }

    #[test]
    fn test_run_requires_a_name() {
        assert!(Cli::try_parse_from(["backitup", "run"]).is_err());
    }

    #[test]
    fn test_save_requires_source() {
        assert!(Cli::try_parse_from(["backitup", "save", "docs", "--dest", "/mnt"]).is_err());
    }
}
