//! Disqueue command line client
//!
//! ## Usage
//!
//! ```bash
//! # Create a queue and list all queues
//! disqueue --url http://localhost:8080 create
//! disqueue list
//!
//! # Put, peek and take items
//! disqueue put <queue> "hello" --key greeting
//! disqueue peek <queue>
//! disqueue take <queue> --key greeting
//!
//! # Stream items as they arrive over the take websocket
//! disqueue watch <queue> --key a --key b
//! ```

use clap::{Parser, Subcommand};
use disqueue::{queue_create, queue_list, Config, Disqueue, QueueItem};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "disqueue")]
#[command(about = "Client for the Disqueue work-queue service")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the queue server
    #[arg(long, env = "DISQUEUE_URL")]
    url: Option<String>,

    /// Basic-auth username
    #[arg(long, env = "DISQUEUE_USERNAME")]
    username: Option<String>,

    /// Basic-auth password
    #[arg(long, env = "DISQUEUE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a queue and print its name
    Create {
        /// Requested name (a UUID); generated by the server if omitted
        #[arg(long)]
        name: Option<String>,
    },
    /// List all queues
    List,
    /// Show queue info
    Info { queue: String },
    /// Delete a queue
    Delete { queue: String },
    /// Put a value in a queue
    Put {
        queue: String,
        value: String,
        #[arg(long)]
        key: Option<String>,
    },
    /// Take the next item from a queue
    Take {
        queue: String,
        #[arg(long)]
        key: Option<String>,
    },
    /// Show the next item without removing it
    Peek {
        queue: String,
        #[arg(long)]
        key: Option<String>,
    },
    /// Print items as they are delivered until the connection closes
    Watch {
        queue: String,
        /// Only items with this key; may be repeated
        #[arg(long)]
        key: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("disqueue=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(url) = args.url {
        config.url = url;
    }
    if let Some(username) = args.username {
        config.username = Some(username);
    }
    if let Some(password) = args.password {
        config.password = Some(password);
    }

    let client = Disqueue::new(config)?;

    match args.command {
        Command::Create { name } => {
            println!("{}", queue_create(client.http(), name.as_deref()).await?);
        }
        Command::List => {
            for name in queue_list(client.http()).await? {
                println!("{}", name);
            }
        }
        Command::Info { queue } => {
            let info = client.queue(&queue).await?.info().await?;
            println!("{}", info.name);
        }
        Command::Delete { queue } => {
            client.queue(&queue).await?.delete().await?;
            info!(queue = %queue, "Queue deleted");
        }
        Command::Put { queue, value, key } => {
            client.queue(&queue).await?.put(key.as_deref(), &value).await?;
        }
        Command::Take { queue, key } => {
            print_item(&client.queue(&queue).await?.take(key.as_deref()).await?);
        }
        Command::Peek { queue, key } => {
            print_item(&client.queue(&queue).await?.peek(key.as_deref()).await?);
        }
        Command::Watch { queue, key } => {
            client.queue(&queue).await?;

            if key.is_empty() {
                client.register(&queue, None, print_delivery);
            }
            for key in &key {
                client.register(&queue, Some(key), print_delivery);
            }

            client.run().await?;
        }
    }

    Ok(())
}

fn print_item(item: &QueueItem) {
    print_delivery(item.key.as_deref(), &item.value);
}

fn print_delivery(key: Option<&str>, value: &str) {
    println!("{}\t{}", key.unwrap_or("-"), value);
}
