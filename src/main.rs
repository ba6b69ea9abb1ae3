use anyhow::{anyhow, bail, Context, Result};
use crossterm::style::Stylize;
use sql_pager::config::Config;
use sql_pager::display::{CellFormats, DisplaySync, Viewport};
use sql_pager::logging;
use sql_pager::services::{self, channel_pair, stdio_bridge, HostSession};
use sql_pager::table_display::TextRenderer;
use sql_pager::ui;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
struct CliArgs {
    file: Option<PathBuf>,
    query: Option<String>,
    page_size: Option<usize>,
    config_path: Option<PathBuf>,
    print: bool,
    all: bool,
    serve: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--query" | "-q" => {
                cli.query = Some(iter.next().context("--query needs a value")?.clone());
            }
            "--page-size" => {
                let value = iter.next().context("--page-size needs a value")?;
                let page_size: usize = value
                    .parse()
                    .with_context(|| format!("Not a page size: {}", value))?;
                if page_size == 0 {
                    bail!("--page-size must be at least 1");
                }
                cli.page_size = Some(page_size);
            }
            "--config" => {
                cli.config_path = Some(PathBuf::from(
                    iter.next().context("--config needs a path")?,
                ));
            }
            "--print" => cli.print = true,
            "--all" => cli.all = true,
            "--serve" => cli.serve = true,
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            file => {
                if cli.file.is_some() {
                    bail!("Only one data file can be opened");
                }
                cli.file = Some(PathBuf::from(file));
            }
        }
    }

    if cli.all && !cli.print {
        bail!("--all only applies to --print");
    }
    if cli.print && cli.serve {
        bail!("--print and --serve are exclusive");
    }
    Ok(cli)
}

fn print_help() {
    println!("{}", "sql-pager - page through SQL results over a data file".blue().bold());
    println!();
    println!("{}", "Usage:".yellow());
    println!("  sql-pager [OPTIONS] <FILE.csv|FILE.json>");
    println!();
    println!("{}", "Options:".yellow());
    println!("  {}  - Query to run instead of the default", "--query SQL".green());
    println!("  {}  - Rows per page", "--page-size N".green());
    println!("  {} - Read configuration from PATH", "--config PATH".green());
    println!("  {}        - Print the first page and exit", "--print".green());
    println!("  {}          - With --print, print every page", "--all".green());
    println!("  {}        - Speak line-delimited JSON on stdin/stdout", "--serve".green());
    println!("  {}  - Initialize configuration with wizard", "--init-config".green());
    println!("  {} - Generate config file with defaults", "--generate-config".green());
    println!();
    println!("{}", "Controls:".yellow());
    println!("  {}    - Switch between Query/Results mode", "Tab".green());
    println!("  {}  - Execute query", "Enter".green());
    println!("  {}   - Scroll results; more rows load at the bottom", "↑↓ j k".green());
    println!("  {}    - Toggle log pane", "F12".green());
    println!("  {} - Quit", "Ctrl+Q".green());
    println!();
}

fn generate_config() -> Result<()> {
    let path = Config::get_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Error creating config directory: {:?}", parent))?;
    }
    std::fs::write(&path, Config::create_default_with_comments())
        .with_context(|| format!("Error writing config file: {:?}", path))?;
    println!("Configuration file created at: {:?}", path);
    println!("Edit this file to customize sql-pager.");
    Ok(())
}

fn load_config(cli: &CliArgs) -> Result<Config> {
    let mut config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Config loading error ({:#}), using defaults", e);
            Config::default()
        }),
    };
    if let Some(page_size) = cli.page_size {
        config.query.page_size = page_size;
    }
    Ok(config)
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Print pages to stdout. Returns false when the query failed.
fn run_print(
    document: services::LoadedDocument,
    config: &Config,
    query: &str,
    all_pages: bool,
) -> Result<bool> {
    let runtime = build_runtime()?;
    let page_size = config.query.page_size;

    runtime.block_on(async {
        let (host, mut display) = channel_pair(4);
        let session = HostSession::new(Arc::new(document.engine), page_size);
        let session_task = session.spawn(host);

        let renderer = TextRenderer::stdout(CellFormats::from(&config.display));
        let mut sync = DisplaySync::new(renderer, page_size);

        let mut request = Some(sync.submit(query));
        while let Some(message) = request.take() {
            display
                .send(message)
                .await
                .map_err(|_| anyhow!("Query engine stopped"))?;
            let reply = display
                .recv()
                .await
                .ok_or_else(|| anyhow!("Query engine stopped"))?;
            sync.on_host_message(reply);

            let renderer = sync.renderer();
            let more_wanted = all_pages && !renderer.failed() && !renderer.closed();
            if more_wanted && renderer.last_page_rows() >= page_size {
                let rendered = sync.rendered_rows();
                request = sync.on_viewport(Viewport::new(0, rendered, rendered));
            }
        }

        let failed = sync.renderer().failed();
        drop(display);
        session_task.await??;
        Ok(!failed)
    })
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|a| a == "--init-config") {
        Config::init_wizard()?;
        println!("\nConfiguration initialized successfully!");
        return Ok(());
    }

    if args.iter().any(|a| a == "--generate-config") {
        return generate_config();
    }

    let cli = parse_args(&args)?;
    let file = cli
        .file
        .clone()
        .ok_or_else(|| anyhow!("No data file given. Run with --help for usage."))?;
    let config = load_config(&cli)?;

    // stdout belongs to the results in print and serve modes
    let log_buffer = if cli.print || cli.serve {
        logging::init_stderr_tracing(&config.logging.filter);
        None
    } else {
        Some(logging::init_tracing(&config.logging.filter))
    };

    let document = services::load_file(&file, &config.query)?;
    info!(target: "query", "{}", document.status_message());

    if cli.serve {
        let runtime = build_runtime()?;
        let session = HostSession::new(Arc::new(document.engine), config.query.page_size);
        return runtime.block_on(stdio_bridge::serve(session));
    }

    if cli.print {
        let query = cli
            .query
            .clone()
            .unwrap_or_else(|| document.default_query.clone());
        if !run_print(document, &config, &query, cli.all)? {
            std::process::exit(1);
        }
        return Ok(());
    }

    let runtime = build_runtime()?;
    ui::run_explorer(
        document,
        &config,
        cli.query.clone(),
        log_buffer.unwrap_or_default(),
        &runtime,
    )
}
