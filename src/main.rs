use exvr_launcher::{cli, config, console::ConsolePresenter, logging};
use exvr_launcher_engine::{ConfigStore, Pipeline, LAUNCHER_VERSION};

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("✗ Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let args = cli::parse(std::env::args().skip(1))?;
    if args.help {
        cli::print_help();
        return Ok(0);
    }
    if args.version {
        println!("exvr-launcher {} (launcher version {})", env!("CARGO_PKG_VERSION"), LAUNCHER_VERSION);
        return Ok(0);
    }

    let home = config::launcher_home();
    let settings = config::load_for_home(&home, args.config.as_deref())?;
    let log_dir = settings.log_dir.clone().unwrap_or_else(|| home.join("logs"));
    let log_file = logging::init(&log_dir, args.log)?;
    tracing::info!("[Main] ExVR launcher starting (home {})", home.display());
    tracing::info!("[Main] Logging to {}", log_file.display());

    let store = config::JsonFileStore::new(home.join(config::STATE_FILE));
    if args.reset {
        store.delete()?;
        tracing::info!("[Main] Install record reset");
    }

    let presenter = ConsolePresenter::stdio()
        .with_install_path(args.install_path.clone())
        .assume_yes(args.yes);
    let launch_args = if args.log { vec!["-log".to_string()] } else { Vec::new() };

    let runtime = tokio::runtime::Runtime::new()?;
    let code = runtime.block_on(async move {
        let mut pipeline = Pipeline::new(settings, Box::new(store), Box::new(presenter))?.with_launch_args(launch_args);

        // Ctrl+C → 사용자 취소
        let cancel = pipeline.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("[Main] Interrupt received, cancelling");
                cancel.cancel();
            }
        });

        let outcome = pipeline.run().await;
        anyhow::Ok(outcome.exit_code())
    })?;

    tracing::info!("[Main] Exiting with code {}", code);
    Ok(code)
}
