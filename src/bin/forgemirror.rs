use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use forgemirror::adapters::{destination_forge, source_forge};
use forgemirror::services::GitMirror;
use forgemirror::{Credentials, Forge, MirrorCache, MirrorConfig, MirrorService, RepositoryRef};

/// CLI arguments for forgemirror
#[derive(Parser, Debug)]
#[command(name = "forgemirror", version)]
#[command(about = "Mirror forge repositories (branches, tags, and metadata) into another forge")]
struct Cli {
    /// Config file (default: <config dir>/forgemirror/config.yaml)
    #[arg(long, global = true, env = "FORGEMIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the local mirrors
    #[arg(long, global = true, env = "FORGEMIRROR_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror every repository of a source account into a destination namespace
    Sync(SyncArgs),

    /// Mirror a single source clone URL to a single destination clone URL (git only)
    Mirror(MirrorArgs),
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Source forge
    #[arg(long, env = "FORGEMIRROR_SOURCE_FORGE", default_value = "github")]
    source_forge: Forge,

    /// Source web URL (default: the public instance)
    #[arg(long, env = "FORGEMIRROR_SOURCE_URL")]
    source_url: Option<String>,

    /// User or organization whose repositories are mirrored
    #[arg(long, env = "FORGEMIRROR_SOURCE_OWNER")]
    source_owner: String,

    #[command(flatten)]
    source_auth: SourceAuth,

    /// Destination forge
    #[arg(long, env = "FORGEMIRROR_DESTINATION_FORGE", default_value = "gitlab")]
    destination_forge: Forge,

    /// Destination web URL (default: the public instance)
    #[arg(long, env = "FORGEMIRROR_DESTINATION_URL")]
    destination_url: Option<String>,

    /// Group or user namespace holding the mirror projects
    #[arg(long, env = "FORGEMIRROR_DESTINATION_NAMESPACE")]
    destination_namespace: String,

    #[command(flatten)]
    destination_auth: DestinationAuth,
}

#[derive(Args, Debug)]
struct MirrorArgs {
    /// Source clone URL
    #[arg(long, env = "FORGEMIRROR_MIRROR_SOURCE_URL")]
    source_url: String,

    /// Destination clone URL
    #[arg(long, env = "FORGEMIRROR_MIRROR_DESTINATION_URL")]
    destination_url: String,

    /// Branch the mirror's HEAD points at after fetching
    #[arg(long, env = "FORGEMIRROR_MIRROR_SOURCE_HEAD")]
    source_head: Option<String>,

    #[command(flatten)]
    source_auth: SourceAuth,

    #[command(flatten)]
    destination_auth: DestinationAuth,
}

#[derive(Args, Debug)]
struct SourceAuth {
    #[arg(long, env = "FORGEMIRROR_SOURCE_USER")]
    source_user: Option<String>,

    #[arg(long, env = "FORGEMIRROR_SOURCE_TOKEN", hide_env_values = true)]
    source_token: Option<String>,
}

#[derive(Args, Debug)]
struct DestinationAuth {
    #[arg(long, env = "FORGEMIRROR_DESTINATION_USER")]
    destination_user: Option<String>,

    #[arg(long, env = "FORGEMIRROR_DESTINATION_TOKEN", hide_env_values = true)]
    destination_token: Option<String>,
}

fn init_tracing(verbose: u8) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_filter = match verbose {
            0 => "warn,forgemirror=info",
            1 => "warn,forgemirror=debug",
            _ => "warn,forgemirror=trace",
        };
        tracing_subscriber::EnvFilter::new(default_filter)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = MirrorConfig::load_or_default(cli.config.as_deref())?;
    let cache_dir = cli
        .cache_dir
        .or_else(|| config.cache_dir.clone())
        .unwrap_or_else(MirrorCache::default_root);
    let cache = MirrorCache::new(cache_dir);
    tracing::debug!("Using mirror cache {}", cache.root().display());

    match cli.command {
        Command::Sync(args) => {
            let source = source_forge(
                args.source_forge,
                args.source_url.as_deref(),
                args.source_auth.source_token.clone(),
            )?;
            let destination = destination_forge(
                args.destination_forge,
                args.destination_url.as_deref(),
                args.destination_auth.destination_token.clone(),
            )?;

            let mut service = MirrorService::new(cache, destination, &args.destination_namespace)
                .with_source_credentials(Credentials::from_parts(
                    args.source_auth.source_user,
                    args.source_auth.source_token,
                    args.source_forge.token_username(),
                ))
                .with_destination_credentials(Credentials::from_parts(
                    args.destination_auth.destination_user,
                    args.destination_auth.destination_token,
                    args.destination_forge.token_username(),
                ))
                .with_policy(config.policy.to_policy()?);
            if let Some(remote_name) = config.remote_name {
                service = service.with_remote_name(remote_name);
            }

            let summary = service
                .discover_and_run(source.as_ref(), &args.source_owner)
                .await?;

            // Per-repository failures are already logged
            tracing::debug!("{} repositories processed", summary.outcomes.len());
            Ok(())
        }
        Command::Mirror(args) => {
            let remote_name = config
                .remote_name
                .unwrap_or_else(|| "mirror".to_string());
            let git = GitMirror::new(cache, remote_name);

            let source = RepositoryRef::new(&args.source_url, &args.source_url).with_credentials(
                Credentials::from_parts(args.source_auth.source_user, args.source_auth.source_token, "oauth2"),
            );
            let destination = RepositoryRef::new(&args.destination_url, &args.destination_url)
                .with_credentials(Credentials::from_parts(
                    args.destination_auth.destination_user,
                    args.destination_auth.destination_token,
                    "oauth2",
                ));

            let report = git
                .mirror(&source, &destination, args.source_head.as_deref())
                .await?;
            tracing::info!(
                "{} -> {}: refresh={:?} remote={:?} push={:?}",
                args.source_url,
                args.destination_url,
                report.refresh,
                report.remote,
                report.push
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn env_of(subcommand: &str, arg: &str) -> Option<String> {
        let command = Cli::command();
        let subcommand = command.find_subcommand(subcommand)?;
        let arg = subcommand.get_arguments().find(|a| a.get_id() == arg)?;
        arg.get_env().map(|env| env.to_string_lossy().into_owned())
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mirror_urls_do_not_share_sync_variables() {
        assert_eq!(env_of("sync", "source_url").as_deref(), Some("FORGEMIRROR_SOURCE_URL"));
        assert_eq!(
            env_of("sync", "destination_url").as_deref(),
            Some("FORGEMIRROR_DESTINATION_URL")
        );
        assert_eq!(
            env_of("mirror", "source_url").as_deref(),
            Some("FORGEMIRROR_MIRROR_SOURCE_URL")
        );
        assert_eq!(
            env_of("mirror", "destination_url").as_deref(),
            Some("FORGEMIRROR_MIRROR_DESTINATION_URL")
        );
    }

    #[test]
    fn test_mirror_parses_clone_urls() {
        let cli = Cli::try_parse_from([
            "forgemirror",
            "mirror",
            "--source-url",
            "https://github.com/alice/widget.git",
            "--destination-url",
            "https://gitlab.com/mirrors/widget.git",
            "--source-head",
            "main",
        ])
        .unwrap();

        match cli.command {
            Command::Mirror(args) => {
                assert_eq!(args.source_url, "https://github.com/alice/widget.git");
                assert_eq!(args.destination_url, "https://gitlab.com/mirrors/widget.git");
                assert_eq!(args.source_head.as_deref(), Some("main"));
            }
            other => panic!("expected mirror, got {:?}", other),
        }
    }
}
