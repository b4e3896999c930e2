//! Httptrap CLI

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use httptrap::config::CaptureConfig;
use httptrap::endpoint::EndpointBuilder;
use httptrap::server::{self, ServerOptions};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "serve" => {
            let config = match parse_serve_args(&args[2..]) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{e}");
                    process::exit(1);
                }
            };

            if let Err(e) = serve(config) {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'httptrap' for usage information.");
            process::exit(1);
        }
    }
}

fn usage() {
    eprintln!("Httptrap v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: httptrap <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  serve [--port N] [--config FILE]");
    eprintln!("        Start a recording endpoint; captured requests are");
    eprintln!("        printed to stdout as JSON lines. Ctrl-C to stop.");
}

fn parse_serve_args(args: &[String]) -> Result<CaptureConfig, String> {
    let mut config = CaptureConfig::default();
    let mut port: Option<u16> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| "--port requires a value".to_string())?;
                port = Some(
                    value
                        .parse()
                        .map_err(|e| format!("Invalid port '{value}': {e}"))?,
                );
                i += 2;
            }
            "--config" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config = CaptureConfig::from_file(&PathBuf::from(value))
                    .map_err(|e| e.to_string())?;
                i += 2;
            }
            other => {
                return Err(format!("Unknown option: {other}"));
            }
        }
    }

    if let Some(port) = port {
        config.server.port = port;
    }

    Ok(config)
}

fn serve(config: CaptureConfig) -> httptrap::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let (sequence, handler) = EndpointBuilder::from_config(&config).build();
        let mut server = server::start(handler, &ServerOptions::from(&config.server)).await?;

        println!("Listening on {}", server.addr());

        // Print records from a dedicated thread; slot reads block, so a
        // day-long per-element wait stands in for "until shutdown". The
        // thread dies with the process once the server stops.
        let printer = std::thread::spawn(move || {
            for record in sequence.elements_with_timeout(Duration::from_secs(86400)) {
                match serde_json::to_string(&record) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("Failed to serialize record: {e}"),
                }
            }
        });

        let shutdown = server.shutdown_sender();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.send(()).ok();
            }
        });

        server.wait().await?;
        drop(printer);
        Ok(())
    })
}
