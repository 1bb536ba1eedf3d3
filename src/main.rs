use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syllabus_track::{
    api, db,
    live::{ConnectionState, LiveView},
    mcp::{self, TrackerClient, DEFAULT_PORT},
    models::{NewTopicInput, Priority},
    render,
    tracker::Tracker,
};

#[derive(Parser)]
#[command(name = "sytrack")]
#[command(about = "Track study progress across subjects, topics and exams")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Start MCP server via stdio
    Mcp,
    /// Check whether a server is reachable
    Status,
    /// Print the dashboard
    Dashboard {
        /// Read from the server at SYLLABUS_TRACK_URL instead of the local store
        #[arg(short, long)]
        remote: bool,

        /// Evaluate at this local time (YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        now: Option<NaiveDateTime>,
    },
    /// Print subjects and topics as a tree
    Subjects {
        #[arg(short, long)]
        remote: bool,
    },
    /// Print scheduled exams
    Exams {
        #[arg(short, long)]
        remote: bool,
    },
    /// Add a pending topic to a subject
    AddTopic {
        subject_id: String,
        name: String,

        /// High, Medium or Low
        #[arg(short, long)]
        priority: Option<Priority>,

        /// Deadline (YYYY-MM-DD)
        #[arg(short, long)]
        deadline: Option<NaiveDate>,

        #[arg(short, long)]
        remote: bool,
    },
    /// Flip a topic between completed and pending
    Toggle {
        subject_id: String,
        topic_id: String,

        #[arg(short, long)]
        remote: bool,
    },
    /// Load the starter dataset into an empty store
    Seed {
        #[arg(short, long)]
        remote: bool,
    },
}

/// Initialize tracing with output to stderr (for MCP mode) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "syllabus_track=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // stdout carries the protocol
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_tracker() -> anyhow::Result<Tracker> {
    let db = db::Database::open_default().context("Failed to open the document store")?;
    db.migrate().context("Failed to apply migrations")?;
    Ok(Tracker::new(db))
}

async fn serve(host: &str, port: u16) -> anyhow::Result<()> {
    let app = api::create_router(open_tracker()?);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("syllabus-track listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(cli.command, Some(Commands::Mcp));
    init_tracing(use_stderr);

    match cli.command {
        Some(Commands::Serve { port, host }) => serve(&host, port).await?,
        Some(Commands::Mcp) => mcp::run_stdio_server(open_tracker()?).await?,
        Some(Commands::Status) => {
            let client = TrackerClient::from_env();
            match client.health().await {
                Ok(()) => println!("Server at {} is up", client.base_url()),
                Err(e) => {
                    println!("Server at {} is not reachable: {}", client.base_url(), e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Dashboard { remote: true, now }) => {
            let dashboard = TrackerClient::from_env().dashboard(now).await?;
            print!("{}", render::render_dashboard(&dashboard));
        }
        Some(Commands::Dashboard { remote: false, now }) => {
            let tracker = open_tracker()?;
            let view = LiveView::connect(tracker.db());
            if let ConnectionState::Failed(message) = view.state() {
                anyhow::bail!(message);
            }
            let now = now.unwrap_or_else(|| Local::now().naive_local());
            print!("{}", render::render_dashboard(&view.dashboard(now)));
            if view.seed_offered() {
                println!("\nNo data yet. Run `sytrack seed` to load the starter subjects and exams.");
            }
        }
        Some(Commands::Subjects { remote }) => {
            let subjects = if remote {
                TrackerClient::from_env().list_subjects().await?
            } else {
                open_tracker()?.subjects()?
            };
            print!(
                "{}",
                render::render_subjects(&subjects, Local::now().date_naive())
            );
        }
        Some(Commands::Exams { remote }) => {
            let exams = if remote {
                TrackerClient::from_env().list_exams().await?
            } else {
                open_tracker()?.exams()?
            };
            print!("{}", render::render_exams(&exams, Local::now().date_naive()));
        }
        Some(Commands::AddTopic {
            subject_id,
            name,
            priority,
            deadline,
            remote,
        }) => {
            let input = NewTopicInput {
                name,
                priority,
                deadline,
                link: None,
            };
            let topic = if remote {
                TrackerClient::from_env().add_topic(&subject_id, &input).await?
            } else {
                open_tracker()?.add_topic(&subject_id, input)?
            };
            println!("Added topic {} to {}", topic.id, subject_id);
        }
        Some(Commands::Toggle {
            subject_id,
            topic_id,
            remote,
        }) => {
            let topic = if remote {
                TrackerClient::from_env().toggle_topic(&subject_id, &topic_id).await?
            } else {
                open_tracker()?.toggle_topic_completion(&subject_id, &topic_id)?
            };
            let state = if topic.is_completed { "completed" } else { "pending" };
            println!("{} is now {}", topic.name, state);
        }
        Some(Commands::Seed { remote }) => {
            let seeded = if remote {
                TrackerClient::from_env().seed().await?
            } else {
                open_tracker()?.seed(Local::now().date_naive())?
            };
            if seeded {
                println!("Loaded the starter dataset");
            } else {
                println!("Store already holds subjects or exams; nothing loaded");
            }
        }
        None => serve("127.0.0.1", DEFAULT_PORT).await?,
    }

    Ok(())
}
