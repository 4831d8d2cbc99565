//! Minimal terminal front-end: one line of stdin per user turn, printed
//! deltas as they arrive, `/compact` as the one slash command the core
//! understands directly (anything else is parsed externally, out of scope
//! for this binary).

use mux_core::StreamManager;
use mux_protocol::IpcEvent;
use mux_protocol::MuxMetadata;
use mux_protocol::SendMessageOptions;
use mux_protocol::WorkspaceId;
use std::io::Write;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

pub async fn run(manager: StreamManager, workspace_id: WorkspaceId) -> anyhow::Result<()> {
    let subscription = manager.subscribe_chat(workspace_id).await?;
    for event in &subscription.initial {
        print_event(event);
    }
    let mut receiver = subscription.receiver;
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            print_event(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("> ");
    std::io::stdout().flush().ok();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            print!("> ");
            std::io::stdout().flush().ok();
            continue;
        }
        if line == "/quit" {
            break;
        }

        let options = if line == "/compact" {
            let mut options = SendMessageOptions::default();
            options.mux_metadata = Some(MuxMetadata::CompactionRequest {
                target_words: None,
                continue_message: None,
                resume_model: None,
            });
            options
        } else {
            SendMessageOptions::default()
        };

        let result = manager.send_message(workspace_id, line.to_string(), options).await?;
        if !result.success {
            if let Some(error) = result.error {
                eprintln!("error: {}", error.message);
            }
        }

        print!("> ");
        std::io::stdout().flush().ok();
    }

    Ok(())
}

fn print_event(event: &IpcEvent) {
    match event {
        IpcEvent::StreamDelta { delta, .. } => {
            print!("{delta}");
            std::io::stdout().flush().ok();
        }
        IpcEvent::StreamEnd { .. } => println!(),
        IpcEvent::StreamAbort { .. } => println!("\n[interrupted]"),
        IpcEvent::StreamError { error, .. } => println!("\n[error] {error}"),
        IpcEvent::ToolCallStart { tool_name, .. } => println!("\n[tool: {tool_name}]"),
        IpcEvent::Whole { message } => {
            if message.compacted {
                println!("\n[history compacted]");
            }
        }
        _ => {}
    }
}
