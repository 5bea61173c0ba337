use anyhow::{Context, Result};
use indicatif::HumanBytes;
use runtime_fetcher::{
    cli::{Cli, Commands, TargetArgs},
    download::{InstallRoot, ReleaseSource},
    ConsoleUi, FetchConfig, FetchError, Platform, Runner, Setup, UiApp,
};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose, cli.command.is_tui());

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(failure_code(&err))
        }
    }
}

fn init_tracing(verbose: bool, tui: bool) {
    // The dashboard owns the terminal; only let problems through
    let default = match (tui, verbose) {
        (true, _) => "runtime_fetcher=warn",
        (false, true) => "runtime_fetcher=debug",
        (false, false) => "runtime_fetcher=info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUNTIME_FETCHER_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Returns the process exit code: the child's for commands that launch bun, 0 otherwise.
fn run(cli: Cli) -> Result<u8> {
    match &cli.command {
        Commands::Setup { target, tui } => {
            let setup = Setup::new(&fetch_config(&cli, target)?)?;
            let outcome = if *tui {
                let mut ui = UiApp::new().context("Failed to start terminal UI")?;
                let outcome = setup.run(&mut ui)?;
                ui.finish(&format!("Bun ready: {}", outcome.installation().executable.display()))?;
                outcome
            } else {
                setup.run(&mut ConsoleUi::new())?
            };
            println!("{}", outcome.installation().executable.display());
            Ok(0)
        }

        Commands::Run { target, args } => {
            let config = fetch_config(&cli, target)?;
            let setup = Setup::new(&config)?;
            let runner = Runner::resolve(&config.install_root(), setup.key());
            Ok(exit_code(runner.run(&config.project_dir, args)?))
        }

        Commands::Install { target } => setup_and_run(&cli, target, vec!["install".to_string()]),

        Commands::Test { target, args } => {
            let mut bun_args = vec!["test".to_string()];
            bun_args.extend(args.iter().cloned());
            setup_and_run(&cli, target, bun_args)
        }

        Commands::Add { target, package } => {
            setup_and_run(&cli, target, vec!["add".to_string(), package.clone()])
        }

        Commands::Which { target } => {
            let config = fetch_config(&cli, target)?;
            let setup = Setup::new(&config)?;
            let runner = Runner::resolve(&config.install_root(), setup.key());
            println!("{}", runner.executable()?.display());
            Ok(0)
        }

        Commands::List => {
            let root = install_root(&cli)?;
            let installs = root.installations()?;
            if installs.is_empty() {
                println!("No installations under {}", root.path().display());
            }
            for (dir, receipt) in installs {
                println!(
                    "  {:<10} {:<24} {} ({})",
                    receipt.version,
                    receipt.platform,
                    dir.join(&receipt.executable).display(),
                    HumanBytes(runtime_fetcher::download::dir_size(&dir))
                );
            }
            Ok(0)
        }

        Commands::Platforms => {
            let detected = Platform::detect().ok();
            println!("Supported platforms:\n");
            for platform in Platform::ALL {
                let marker = if Some(platform) == detected { "*" } else { " " };
                println!(
                    "{marker} {:<24} {:<32} {}",
                    platform.name(),
                    platform.asset_name(),
                    platform.executable_name()
                );
            }
            Ok(0)
        }

        Commands::Clean { version } => {
            let root = install_root(&cli)?;
            let freed = root.clean(version.as_deref())?;
            if freed == 0 {
                println!("Nothing to clean under {}", root.path().display());
            } else {
                println!("Cleaned {} of installed runtimes", HumanBytes(freed));
            }
            Ok(0)
        }
    }
}

fn setup_and_run(cli: &Cli, target: &TargetArgs, args: Vec<String>) -> Result<u8> {
    let config = fetch_config(cli, target)?;
    let installation = Setup::new(&config)?
        .run(&mut ConsoleUi::new())?
        .into_installation();
    Ok(exit_code(installation.runner().run(&config.project_dir, &args)?))
}

fn failure_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<FetchError>().map_or(1, FetchError::exit_code)
}

/// Codes outside 0..=255 (Windows) collapse to a generic failure.
fn exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn install_root(cli: &Cli) -> Result<InstallRoot> {
    let path = match &cli.root {
        Some(root) => std::path::absolute(root)
            .with_context(|| format!("Could not resolve root {}", root.display()))?,
        None => InstallRoot::default_path()
            .context("Could not determine cache directory, pass --root")?,
    };
    Ok(InstallRoot::new(path))
}

fn fetch_config(cli: &Cli, target: &TargetArgs) -> Result<FetchConfig> {
    let root = install_root(cli)?;
    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Could not determine current directory")?,
    };

    let defaults = ReleaseSource::default();
    let source = ReleaseSource::new(
        cli.download_base.clone().unwrap_or(defaults.download_base),
        cli.checksum_base.clone().unwrap_or(defaults.checksum_base),
    );

    Ok(FetchConfig::new(root.path(), project_dir)
        .with_version(target.version.as_deref())
        .with_platform(target.platform)
        .with_source(source)
        .with_timeout(cli.timeout.map(Duration::from_secs)))
}
