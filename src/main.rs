mod actions;
mod api;
mod app;
mod config;
mod error;
mod http;
mod route;
mod ui;
mod utils;
mod worker;

use actions::{Request, Response};
use anyhow::Result;
use api::ChatRequest;
use app::AppController;
use clap::{Parser, Subcommand};
use config::AppConfig;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use http::ReqwestTransport;
use log::{debug, info};
use ratatui::{
    backend::CrosstermBackend,
    Terminal,
};
use route::{Platform, RouteRequest};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use worker::FetchWorker;

#[derive(Parser, Debug)]
#[command(name = "quanquan-vfp", version, about = "QuanQuan Virtual Flight Platform companion")]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chat completion API key
    #[arg(long, env = "QQVFP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat completion endpoint
    #[arg(long)]
    chat_url: Option<String>,

    /// Chat model name
    #[arg(long)]
    model: Option<String>,

    /// Routing service endpoint
    #[arg(long)]
    route_url: Option<String>,

    /// AIRAC cycle, e.g. 2506
    #[arg(long)]
    cycle: Option<String>,

    /// Directory that receives the way/ and file/ folders
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive terminal UI (default)
    Tui,
    /// Fetch a route and save the route files
    Route {
        departure: String,
        arrival: String,
        #[arg(short, long, default_value = "XPLANE12")]
        platform: Platform,
    },
    /// Ask the assistant a single question
    Chat {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(key) = &self.api_key {
            config.chat.api_key = Some(key.clone());
        }
        if let Some(url) = &self.chat_url {
            config.chat.api_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.chat.model = model.clone();
        }
        if let Some(url) = &self.route_url {
            config.route.base_url = url.clone();
        }
        if let Some(cycle) = &self.cycle {
            config.route.airac_cycle = cycle.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.route.output_dir = dir.clone();
        }
        if let Some(secs) = self.timeout {
            config.request_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
    let worker = FetchWorker::new(transport, &config);

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => run_tui(worker, &config).await,
        Command::Route { departure, arrival, platform } => {
            let request = RouteRequest::new(&departure, &arrival, platform)?;
            run_once(worker, Request::PlanRoute { id: 1, request }).await
        }
        Command::Chat { prompt } => {
            let request = ChatRequest::new(&prompt.join(" "))?;
            run_once(worker, Request::Chat { id: 1, request }).await
        }
    }
}

/// Send one request and print its outcome.
async fn run_once(worker: FetchWorker<ReqwestTransport>, request: Request) -> Result<()> {
    let (req_tx, mut resp_rx, _handle) = worker.start();
    req_tx.send(request).await?;

    match resp_rx.recv().await {
        Some(Response::RouteFinished { outcome, .. }) => {
            let result = outcome?;
            println!("Route: {}", result.airway_text);
            println!(
                "Route file saved: {} ({})",
                result.display_file_name,
                result.file_path.display()
            );
        }
        Some(Response::ChatFinished { outcome, .. }) => {
            println!("{}", outcome?.response_text);
        }
        None => anyhow::bail!("Fetch worker stopped without a response"),
    }
    Ok(())
}

async fn run_tui(worker: FetchWorker<ReqwestTransport>, config: &AppConfig) -> Result<()> {
    // Set up panic handler to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let shutdown = worker.shutdown_token();
    let (req_tx, mut resp_rx, handle) = worker.start();
    let mut app_controller = AppController::new(config.servers.clone(), req_tx);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!("Terminal UI started");
    let res = run_app(&mut terminal, &mut app_controller, &mut resp_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    shutdown.cancel();
    let _ = handle.await;

    res
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app_controller: &mut AppController,
    resp_rx: &mut mpsc::Receiver<Response>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render_ui(f, &app_controller.ui_app))?;

        // Handle input with short timeout for responsiveness
        if event::poll(Duration::from_millis(50))? {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if app_controller.handle_key_event(key).await? {
                        break; // Quit was requested
                    }
                }
                Ok(_) => {} // Resize and other events are picked up on the next render
                Err(_) => {}
            }
        }

        // Deliver finished fetches
        while let Ok(resp) = resp_rx.try_recv() {
            debug!("Response for request {}", resp.id());
            app_controller.process_response(resp);
        }

        // Small delay to prevent high CPU usage but keep responsive
        sleep(Duration::from_millis(16)).await; // ~60 FPS

        if app_controller.should_quit() {
            break;
        }
    }

    Ok(())
}
