use clap::{Parser, Subcommand};
use fsagent::Result;
use fsagent::commands::{LlmSelection, add_docs, interactive, query, show_config};

#[derive(Parser)]
#[command(name = "fsagent")]
#[command(about = "Retrieval-grounded question answering over local document directories")]
#[command(version)]
struct Cli {
    /// LLM provider to use (openai or openrouter)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model to use
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agent a single question
    Query {
        /// The question to ask
        text: String,
    },
    /// Add documents from a directory to the vector store
    AddDocs {
        /// Directory to scan for indexable files
        directory: String,
    },
    /// Run an interactive question/answer session
    Interactive,
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let selection = LlmSelection {
        provider: cli.provider,
        model: cli.model,
    };

    match cli.command {
        Commands::Query { text } => {
            query(selection, text).await?;
        }
        Commands::AddDocs { directory } => {
            add_docs(directory).await?;
        }
        Commands::Interactive => {
            interactive(selection).await?;
        }
        Commands::Config => {
            show_config()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["fsagent", "interactive"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Interactive);
        }
    }

    #[test]
    fn query_command_with_text() {
        let cli = Cli::try_parse_from(["fsagent", "query", "What color is the sky?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Query { text } = parsed.command {
                assert_eq!(text, "What color is the sky?");
            }
        }
    }

    #[test]
    fn query_command_with_provider() {
        let cli = Cli::try_parse_from([
            "fsagent",
            "query",
            "What color is the sky?",
            "--provider",
            "openrouter",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.provider.as_deref(), Some("openrouter"));
        }
    }

    #[test]
    fn add_docs_command() {
        let cli = Cli::try_parse_from(["fsagent", "add-docs", "data/new"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::AddDocs { directory } = parsed.command {
                assert_eq!(directory, "data/new");
            }
        }
    }

    #[test]
    fn model_flag_is_global() {
        let cli = Cli::try_parse_from(["fsagent", "interactive", "--model", "gpt-4o"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.model.as_deref(), Some("gpt-4o"));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["fsagent", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["fsagent", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
