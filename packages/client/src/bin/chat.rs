//! Terminal chat client for one support room.
//!
//! Connects, joins the room, loads history, then reads lines from stdin and
//! sends them as chat messages. Pushed messages, typing indicators, presence
//! changes and notifications are printed as they arrive.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chat -- --token <jwt> --user-id 1 --user-name Alice --room 3
//! ```

use std::sync::Arc;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use tsunagi_client::{ClientConfig, RealtimeClient};
use tsunagi_shared::logger::setup_logger;
use tsunagi_shared::time::millis_to_rfc3339;

#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(about = "Realtime storefront chat client", long_about = None)]
struct Args {
    /// WebSocket endpoint
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// REST API base URL
    #[arg(short = 'a', long, default_value = "http://127.0.0.1:8080/api")]
    api_url: String,

    /// Bearer credential for this session
    #[arg(short = 't', long)]
    token: String,

    /// Numeric id of the session user
    #[arg(long)]
    user_id: i64,

    /// Display name of the session user
    #[arg(long)]
    user_name: String,

    /// Room to join
    #[arg(short = 'r', long)]
    room: i64,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("client error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::new(
        args.url,
        args.api_url,
        args.token,
        args.user_id,
        args.user_name.clone(),
    );
    let room_id = args.room;
    let client = Arc::new(RealtimeClient::new(config));
    client.start().await;

    // Wait for the first successful connect before joining.
    let mut connected = client.connected_watch();
    while !*connected.borrow() {
        connected.changed().await?;
    }

    client.join_room(room_id).await?;
    client.load_history(room_id).await?;

    println!(
        "\nYou are '{}' in room {}. Type messages and press Enter to send. Ctrl+C to exit.\n",
        args.user_name, room_id
    );
    for message in client.messages().messages(room_id).await {
        println!(
            "[{}] {}: {}",
            millis_to_rfc3339(message.created_at),
            message.sender_name,
            message.content
        );
    }

    spawn_printers(client.clone(), room_id, args.user_name.clone()).await;

    // rustyline is synchronous; run it on its own thread and bridge lines
    // into the async world over a channel.
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let prompt = format!("{}> ", args.user_name);
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };
        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    tracing::error!("readline error: {}", err);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            line = input_rx.recv() => match line {
                Some(line) => {
                    client.note_typing_activity(room_id).await;
                    client.send_message(room_id, &line).await;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.leave_room(room_id).await;
    client.stop().await;
    Ok(())
}

/// Print pushed updates as they arrive. Each stream gets its own task.
async fn spawn_printers(client: Arc<RealtimeClient>, room_id: i64, user_name: String) {
    let mut messages = client.messages().updates();
    let message_client = client.clone();
    let mut printed = client.messages().messages(room_id).await.len();
    tokio::spawn(async move {
        while let Ok(update) = messages.recv().await {
            if update.room_id != room_id {
                continue;
            }
            let buffer = message_client.messages().messages(room_id).await;
            if buffer.len() < printed {
                printed = buffer.len();
            }
            for message in &buffer[printed..] {
                println!(
                    "\n[{}] {}: {}\n{}> ",
                    millis_to_rfc3339(message.created_at),
                    message.sender_name,
                    message.content,
                    user_name
                );
            }
            printed = buffer.len();
        }
    });

    let mut typing = client.typing().updates();
    let typing_client = client.clone();
    tokio::spawn(async move {
        while let Ok(update) = typing.recv().await {
            if update.room_id != room_id {
                continue;
            }
            let users = typing_client.typing().typing_users(room_id).await;
            if !users.is_empty() {
                let names: Vec<&str> = users.iter().map(|u| u.user_name.as_str()).collect();
                println!("\n... {} typing", names.join(", "));
            }
        }
    });

    let mut inbox = client.inbox().updates();
    let inbox_client = client.clone();
    tokio::spawn(async move {
        while inbox.recv().await.is_ok() {
            let unread = inbox_client.inbox().unread_count().await;
            if let Some(latest) = inbox_client.inbox().notifications().await.first() {
                println!("\n[notification] {} ({} unread)", latest.title, unread);
            }
        }
    });

    let mut presence = client.presence().updates();
    let presence_client = client.clone();
    tokio::spawn(async move {
        while presence.recv().await.is_ok() {
            let online = presence_client.presence().online_users().await;
            println!("\n[online] {} user(s)", online.len());
        }
    });
}
