use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use depot_types::PageParams;

#[derive(Parser)]
#[command(
    name = "depot",
    about = "Depot: deduplicated storage for versioned project releases",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides `storage.data_dir`)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Report which hashes are already stored
    Check(CheckArgs),
    /// Store a file under a hash
    Put(PutArgs),
    /// Fetch an object by hash
    Get(GetArgs),
    /// Upload a directory and submit it as a release
    Publish(PublishArgs),
    /// Show a release manifest
    Show(ShowArgs),
    /// Print one file of a release
    Cat(CatArgs),
    /// Delete a release (objects are kept)
    Delete(DeleteArgs),
    /// Show which releases use the given hashes
    Refs(RefsArgs),
    /// List owners
    Owners,
    /// List projects with their latest revision
    Projects(ProjectsArgs),
    /// List every revision of a project, newest first
    Commits(CommitsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address (overrides `server.bind_addr`)
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct CheckArgs {
    #[arg(required = true)]
    pub hashes: Vec<String>,
}

#[derive(Args)]
pub struct PutArgs {
    pub hash: String,
    pub file: PathBuf,
}

#[derive(Args)]
pub struct GetArgs {
    pub hash: String,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct ReleaseArgs {
    pub owner: String,
    pub project: String,
    pub revision: String,
}

#[derive(Args)]
pub struct PublishArgs {
    #[command(flatten)]
    pub release: ReleaseArgs,
    pub dir: PathBuf,
    /// Defaults to the owner
    #[arg(long)]
    pub author: Option<String>,
    /// JSON file with project metadata
    #[arg(long)]
    pub metadata: Option<PathBuf>,
    /// Release timestamp; defaults to now
    #[arg(long)]
    pub time: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub release: ReleaseArgs,
    /// Show every stored row for the key, not just the newest
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct CatArgs {
    #[command(flatten)]
    pub release: ReleaseArgs,
    pub path: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub release: ReleaseArgs,
}

#[derive(Args)]
pub struct RefsArgs {
    #[arg(required = true)]
    pub hashes: Vec<String>,
}

#[derive(Args, Clone, Copy, Debug, Default)]
pub struct PageArgs {
    /// 1-based page number
    #[arg(long)]
    pub page: Option<usize>,
    #[arg(long)]
    pub size: Option<usize>,
    /// First index, inclusive (with --end, replaces --page/--size)
    #[arg(long)]
    pub start: Option<usize>,
    /// Last index, inclusive
    #[arg(long)]
    pub end: Option<usize>,
}

impl From<PageArgs> for PageParams {
    fn from(args: PageArgs) -> Self {
        PageParams {
            page: args.page,
            size: args.size,
            start: args.start,
            end: args.end,
        }
    }
}

#[derive(Args)]
pub struct ProjectsArgs {
    #[arg(long)]
    pub owner: Option<String>,
    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Args)]
pub struct CommitsArgs {
    pub owner: String,
    pub project: String,
    #[command(flatten)]
    pub page: PageArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["depot", "serve", "--bind", "127.0.0.1:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("127.0.0.1:8080".parse().unwrap()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve_rejects_bad_address() {
        assert!(Cli::try_parse_from(["depot", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_check_requires_hashes() {
        assert!(Cli::try_parse_from(["depot", "check"]).is_err());
        let cli = Cli::try_parse_from(["depot", "check", "h1", "h2"]).unwrap();
        if let Command::Check(args) = cli.command {
            assert_eq!(args.hashes, vec!["h1", "h2"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_publish() {
        let cli = Cli::try_parse_from([
            "depot", "publish", "bob", "app", "rev1", "./dist", "--author", "alice",
        ])
        .unwrap();
        if let Command::Publish(args) = cli.command {
            assert_eq!(args.release.owner, "bob");
            assert_eq!(args.release.revision, "rev1");
            assert_eq!(args.dir, PathBuf::from("./dist"));
            assert_eq!(args.author.as_deref(), Some("alice"));
            assert!(args.metadata.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_commits_pagination() {
        let cli = Cli::try_parse_from([
            "depot", "commits", "bob", "app", "--start", "3", "--end", "1",
        ])
        .unwrap();
        if let Command::Commits(args) = cli.command {
            let params = PageParams::from(args.page);
            assert_eq!(params.start, Some(3));
            assert_eq!(params.end, Some(1));
            assert_eq!(params.page, None);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "depot",
            "owners",
            "--data-dir",
            "/tmp/depot",
            "--format",
            "json",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/depot")));
        assert!(matches!(cli.command, Command::Owners));
    }
}
