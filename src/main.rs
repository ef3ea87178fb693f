//! Threadrun CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use threadrun::api::HttpAssistantApi;
use threadrun::cli::{ChatArgs, Cli, Commands, HistoryArgs};
use threadrun::config::EngineConfig;
use threadrun::run_loop::{ApprovalDecision, ToolApproval};
use threadrun::session::{ChatSession, SendOptions, SessionNotice};
use threadrun::types::{Assistant, ChatMessage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => handle_chat(args).await,
        Commands::History(args) => handle_history(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let Some(prompt) = args.prompt else {
        eprintln!("Usage: threadrun chat \"your prompt here\"");
        std::process::exit(1);
    };

    let mut config = EngineConfig::load()?;
    if let Some(id) = args.assistant {
        config.assistant_id = Some(id);
    }
    if args.web_search {
        config.features.web_search = true;
    }
    let assistant_id = config
        .assistant_id
        .clone()
        .ok_or("missing assistant id (pass --assistant or set THREADRUN_ASSISTANT_ID)")?;

    let api = Arc::new(HttpAssistantApi::new(&config)?);
    let session = Arc::new(ChatSession::new(api, config, Assistant::new(assistant_id)));
    if let Some(id) = args.thread {
        session.open_thread(&id).await?;
    }

    let done = CancellationToken::new();
    let printer = tokio::spawn(stream_reply(session.clone(), done.clone()));
    let approver = tokio::spawn(answer_approvals(session.clone(), args.auto_approve));
    let interrupt = {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                session.cancel();
            }
        })
    };

    let outcome = session.send_message(prompt, SendOptions::new()).await;

    done.cancel();
    let _ = printer.await;
    approver.abort();
    interrupt.abort();
    println!();

    if let Some(SessionNotice::QuotaExceeded { message, .. }) = session.notice() {
        eprintln!("Quota exceeded: {message}");
    }
    if let Some(thread) = &outcome.thread {
        eprintln!("thread: {}", thread.id);
    }
    if outcome.aborted {
        eprintln!("cancelled");
    }
    if let Some(err) = outcome.failure {
        return Err(err.into());
    }
    Ok(())
}

async fn handle_history(args: HistoryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load()?;
    let api = Arc::new(HttpAssistantApi::new(&config)?);
    let assistant = Assistant::new(config.assistant_id.clone().unwrap_or_default());
    let session = ChatSession::new(api, config, assistant);

    session.open_thread(&args.thread).await?;
    session.load_history().await?;
    for message in session.messages() {
        let role = match message {
            ChatMessage::User(_) => "user",
            ChatMessage::Assistant(_) => "assistant",
        };
        println!("[{role}] {}", message.content());
    }
    Ok(())
}

/// Echo the trailing assistant reply as it grows, until `done` fires.
async fn stream_reply(session: Arc<ChatSession>, done: CancellationToken) {
    let mut updates = WatchStream::from_changes(session.watch_messages());
    let mut printed = String::new();
    loop {
        tokio::select! {
            next = updates.next() => match next {
                Some(messages) => print_progress(&messages, &mut printed),
                None => break,
            },
            _ = done.cancelled() => break,
        }
    }
    print_progress(&session.messages(), &mut printed);
}

fn print_progress(messages: &[ChatMessage], printed: &mut String) {
    let Some(reply) = messages.last().and_then(ChatMessage::as_assistant) else {
        return;
    };
    let content = reply.content.as_str();
    if !content.starts_with(printed.as_str()) {
        // The server restarted the reply.
        println!();
        printed.clear();
    }
    print!("{}", &content[printed.len()..]);
    let _ = std::io::stdout().flush();
    printed.replace_range(.., content);
}

async fn answer_approvals(session: Arc<ChatSession>, auto_approve: bool) {
    let mut rx = session.watch_pending_approval();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while rx.changed().await.is_ok() {
        let Some(approval) = rx.borrow_and_update().clone() else {
            continue;
        };
        let decision = if auto_approve {
            ApprovalDecision::Once
        } else {
            prompt_decision(&approval, &mut lines).await
        };
        session.decide_approval(decision);
    }
}

async fn prompt_decision(
    approval: &ToolApproval,
    lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
) -> ApprovalDecision {
    eprint!("\nAllow tool '{}'? [y]es / [a]lways / [n]o: ", approval.tool_id);
    match lines.next_line().await {
        Ok(Some(line)) => match line.trim().to_ascii_lowercase().as_str() {
            "a" | "always" => ApprovalDecision::Always,
            "y" | "yes" => ApprovalDecision::Once,
            _ => ApprovalDecision::Decline,
        },
        _ => ApprovalDecision::Decline,
    }
}
