// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker Bootstrap (spec §4.9): assembles the session manager, renderer
//! client, transcriber, dispatcher, and media watcher for one bot
//! credential, then drives the chat-update loop and the supervisor IPC
//! channel until shutdown.
//!
//! IPC owns this process's stdin/stdout exclusively (spec §6: "over the
//! child's stdin/stdout pipes"); logs go to stderr so the two streams
//! never interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use fleet_common::chat::{no_session_commands, ChatApi, ChatUpdate, UserId};
use fleet_common::config::Config;
use fleet_common::ipc::{IpcEnvelope, IpcMessage, IpcReader, IpcWriter};
use fleet_common::procstat::resident_memory_bytes;
use fleet_common::telegram::TelegramChatApi;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fleet_worker::dispatcher::Dispatcher;
use fleet_worker::media::MediaWatcher;
use fleet_worker::renderer::RendererClient;
use fleet_worker::session::SessionManager;
use fleet_worker::transcribe::{GoogleTranscriber, OpenAiTranscriber, Transcriber};

type IpcOut = Arc<Mutex<IpcWriter<tokio::io::Stdout>>>;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

async fn send_ipc(ipc_out: &IpcOut, bot_id: &str, message: IpcMessage) {
    let envelope = IpcEnvelope::new(bot_id, now_ms(), message);
    if let Err(e) = ipc_out.lock().await.send(&envelope).await {
        warn!(error = %e, "failed to write IPC envelope to supervisor");
    }
}

/// The chat user a [`ChatUpdate`] belongs to, for per-user dispatch
/// ordering. `None` carries no ordering obligation (the gate rejects it
/// before any session work happens regardless).
fn update_user_id(update: &ChatUpdate) -> Option<UserId> {
    match update {
        ChatUpdate::Message(msg) => msg.user_id,
        ChatUpdate::CallbackQuery(cb) => cb.user_id,
        ChatUpdate::Unknown => None,
    }
}

fn build_transcriber(config: &Config) -> Option<Arc<dyn Transcriber>> {
    use fleet_common::config::TtsProvider;
    let key = config.tts_api_key.clone()?;
    match config.tts_provider()? {
        TtsProvider::OpenAiCompatible => Some(Arc::new(OpenAiTranscriber::new(key))),
        TtsProvider::GoogleCompatible => Some(Arc::new(GoogleTranscriber::new(key))),
    }
}

/// Supervisor IPC reader task: `SHUTDOWN` cancels the worker's
/// `shutdown` token; `HEALTH_CHECK` replies with this process's uptime
/// and resident memory (spec §4.8 `healthCheck`).
async fn run_ipc_reader(ipc_out: IpcOut, bot_id: String, shutdown: CancellationToken, start_time: Instant) {
    let mut ipc_in = IpcReader::new(tokio::io::stdin());
    loop {
        match ipc_in.recv().await {
            Ok(Some(envelope)) => match envelope.message {
                IpcMessage::Shutdown => {
                    info!("received SHUTDOWN from supervisor");
                    shutdown.cancel();
                    return;
                }
                IpcMessage::HealthCheck => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    let mem_bytes = resident_memory_bytes();
                    send_ipc(&ipc_out, &bot_id, IpcMessage::HealthResponse { uptime_secs, mem_bytes }).await;
                }
                _ => {}
            },
            Ok(None) => {
                // Supervisor's stdin pipe closed: it is gone, follow it down.
                shutdown.cancel();
                return;
            }
            Err(e) => {
                warn!(error = %e, "IPC read error, shutting down");
                shutdown.cancel();
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::parse();
    init_tracing(&config);

    let Some(token) = config.bot_token.clone() else {
        eprintln!("error: fleet-worker requires BOT_TOKEN (set by the supervisor at fork time)");
        std::process::exit(1);
    };
    let bot_id = config.own_bot_id().unwrap_or_else(|| Config::bot_id(0));

    let ipc_out: IpcOut = Arc::new(Mutex::new(IpcWriter::new(tokio::io::stdout())));

    fleet_common::telegram::ensure_crypto();
    let config = Arc::new(config);
    let shutdown = CancellationToken::new();

    let chat: Arc<dyn ChatApi> = Arc::new(TelegramChatApi::new(&token));
    let renderer = Arc::new(RendererClient::new(config.renderer_url.clone()));
    let transcriber = build_transcriber(&config);

    let sessions = SessionManager::new(
        config.shell_path.clone(),
        config.rows,
        config.cols,
        Duration::from_millis(config.session_timeout_ms),
        config.max_output_lines,
        config.resolved_home_dir(),
        shutdown.clone(),
    );

    let media_watcher = MediaWatcher::new(Arc::clone(&chat), config.allowed_user_ids.clone(), config.media_dir(&bot_id));
    if let Err(e) = media_watcher.prepare_directory(config.clean_media_on_start).await {
        warn!(error = %e, "failed to prepare media directory");
    }
    tokio::spawn(Arc::clone(&media_watcher).run(shutdown.clone()));

    let dispatcher =
        Arc::new(Dispatcher::new(Arc::clone(&config), Arc::clone(&sessions), Arc::clone(&chat), renderer, transcriber, bot_id.clone(), Arc::clone(&ipc_out)));

    if let Err(e) = chat.set_my_commands(&no_session_commands()).await {
        warn!(error = %e, "failed to register no-session command menu");
    }

    match chat.get_me().await {
        Ok(info) => send_ipc(&ipc_out, &bot_id, IpcMessage::BotInfo { full_name: info.full_name, username: info.username }).await,
        Err(e) => warn!(error = %e, "getMe failed during startup"),
    }

    send_ipc(&ipc_out, &bot_id, IpcMessage::Ready).await;
    info!(bot_id = %bot_id, "worker ready");

    let start_time = Instant::now();
    tokio::spawn(run_ipc_reader(Arc::clone(&ipc_out), bot_id.clone(), shutdown.clone(), start_time));

    // One dispatch queue per user: a dedicated task drains each queue in
    // arrival order, so two updates from the same chat session can never
    // have their PTY writes interleave (spec §5: "keystrokes are
    // delivered to the PTY in the order they arrived from the chat
    // API"). Updates from different users still dispatch concurrently.
    let mut user_queues: HashMap<UserId, mpsc::UnboundedSender<ChatUpdate>> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = chat.next_updates(30) => {
                match result {
                    Ok(updates) => {
                        for update in updates {
                            match update_user_id(&update) {
                                Some(user_id) => {
                                    let tx = user_queues.entry(user_id).or_insert_with(|| {
                                        let (tx, mut rx) = mpsc::unbounded_channel::<ChatUpdate>();
                                        let dispatcher = Arc::clone(&dispatcher);
                                        tokio::spawn(async move {
                                            while let Some(update) = rx.recv().await {
                                                dispatcher.handle_update(update).await;
                                            }
                                        });
                                        tx
                                    });
                                    let _ = tx.send(update);
                                }
                                None => {
                                    let dispatcher = Arc::clone(&dispatcher);
                                    tokio::spawn(async move { dispatcher.handle_update(update).await });
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "next_updates failed, backing off");
                        send_ipc(&ipc_out, &bot_id, IpcMessage::Error { text: e.to_string() }).await;
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }
    }

    info!(bot_id = %bot_id, "worker shutting down");
}
