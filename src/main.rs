use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stitch::data::{ContextMode, Strictness, DEFAULT_MARKER};

mod cli;

#[derive(Parser)]
#[command(name = "stitch")]
#[command(about = "Harvests source context, asks a language model for files and writes them back", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Perform a dry run without writing files")]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print the concatenated source context of a directory")]
    Scan {
        #[arg(default_value = ".", help = "Directory to scan")]
        root: PathBuf,

        #[arg(long = "ext", help = "File extension to include (repeatable, default .go)")]
        extensions: Vec<String>,

        #[arg(long, default_value_t = 5, help = "Maximum number of files to include")]
        max_files: usize,
    },

    #[command(about = "List files containing the todo marker as JSON")]
    Todos {
        #[arg(default_value = ".", help = "Directory to search")]
        root: PathBuf,

        #[arg(long, default_value = DEFAULT_MARKER, help = "Marker to look for")]
        marker: String,

        #[arg(long = "skip", help = "File name to ignore (repeatable)")]
        skip: Vec<String>,
    },

    #[command(about = "Generate files from a prompt and write them to disk")]
    Generate(GenerateArgs),

    #[command(about = "Ask a free-form question and print the answer")]
    Ask {
        #[arg(long, help = "Configuration file (default: stitch.yml if present)")]
        config: Option<PathBuf>,

        #[arg(long, help = "File containing the question")]
        prompt_file: Option<PathBuf>,

        #[arg(long, help = "Model to ask")]
        model: Option<String>,

        #[arg(long, help = "Secrets file providing OPENAI_API_KEY")]
        env_file: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct GenerateArgs {
    #[arg(long, help = "Configuration file (default: stitch.yml if present)")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Where the generation context comes from")]
    mode: Option<ContextMode>,

    #[arg(long, help = "Tree that is scanned or searched for markers")]
    project_root: Option<PathBuf>,

    #[arg(long, help = "Directory generated files are written under")]
    base_path: Option<PathBuf>,

    #[arg(long, help = "Root every generated path must start with")]
    required_root: Option<String>,

    #[arg(long, help = "File containing the user prompt")]
    prompt_file: Option<PathBuf>,

    #[arg(long, value_enum, help = "How the JSON object is pulled out of the reply")]
    strictness: Option<Strictness>,

    #[arg(long, help = "Model to use")]
    model: Option<String>,

    #[arg(long, help = "Secrets file providing OPENAI_API_KEY")]
    env_file: Option<PathBuf>,

    #[arg(long, help = "Seconds to wait for the reply (0 waits forever)")]
    timeout: Option<u64>,

    #[arg(long, help = "Write a JSON run report to this path")]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Scan {
            root,
            extensions,
            max_files,
        } => {
            cli::scan(root, extensions, max_files, &config).await?;
        }
        Commands::Todos { root, marker, skip } => {
            cli::todos(root, marker, skip, &config).await?;
        }
        Commands::Generate(args) => {
            let options = cli::GenerateOptions {
                config_file: args.config,
                mode: args.mode,
                project_root: args.project_root,
                base_path: args.base_path,
                required_root: args.required_root,
                prompt_file: args.prompt_file,
                strictness: args.strictness,
                model: args.model,
                env_file: args.env_file,
                timeout_secs: args.timeout,
                report: args.report,
            };
            cli::generate(options, &config).await?;
        }
        Commands::Ask {
            config: config_file,
            prompt_file,
            model,
            env_file,
        } => {
            let options = cli::GenerateOptions {
                config_file,
                prompt_file,
                model,
                env_file,
                ..Default::default()
            };
            cli::ask(options, &config).await?;
        }
    }

    Ok(())
}
