//! Runtime for the skylink client: fetches server constants, holds the
//! WebSocket link open and feeds everything into one [`Session`].

pub mod config;
pub mod fetch;
pub mod link;

#[cfg(test)]
mod tests;

use anyhow::Context;
use config::ClientConfig;
use futures_util::StreamExt;
use link::{classify, connect, Incoming, Link};
use skylink_engine::{Control, HeadlessScene, Output, Session};
use skylink_protocol::{ActorEntry, TrainingMode};
use std::future::Future;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// A line of user input, already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    Control(Control),
    ShowStatus,
}

pub fn parse_input(line: &str) -> Result<Option<UserInput>, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    let input = match (cmd, arg) {
        ("hover", None) => Control::StartTraining(TrainingMode::Hover),
        ("position" | "p2p", None) => Control::StartTraining(TrainingMode::PositionToPosition),
        ("evaluate", None) => Control::OpenEvaluation,
        ("select", Some(path)) => Control::SelectActor(path.to_string()),
        ("select", None) => Control::SelectActor(String::new()),
        ("restart", None) => Control::RestartEvaluation,
        ("stop", None) => Control::StopEvaluation,
        ("exit", None) => Control::ExitEvaluation,
        ("seed", Some(n)) => Control::SetSeed(n.parse().map_err(|_| format!("bad seed `{n}`"))?),
        ("status", None) => return Ok(Some(UserInput::ShowStatus)),
        _ => return Err(format!("unknown command `{}`", line.trim())),
    };
    Ok(Some(UserInput::Control(input)))
}

/// Reads one command per line until EOF or until the receiver is gone.
pub async fn read_controls<R: AsyncRead + Unpin>(input: R, tx: mpsc::Sender<UserInput>) {
    let mut lines = BufReader::new(input).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        match parse_input(&line) {
            Ok(Some(input)) => {
                if tx.send(input).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{e}"),
        }
    }
}

fn log_status(session: &Session<HeadlessScene>) {
    let view = session.controller().view();
    info!(
        mode = ?session.controller().mode(),
        drones = session.registry().len(),
        markers_loaded = session.markers().is_loaded(),
        legend = view.legend_target.as_deref().unwrap_or("-"),
        progress = view.progress_text.as_deref().unwrap_or("-"),
        evaluation = view.evaluation_info.as_deref().unwrap_or("-"),
        actors = view.actor_options.placeholder(),
        result = view.result_text.as_deref().unwrap_or("-"),
        "status"
    );
}

async fn apply_control(
    session: &mut Session<HeadlessScene>,
    link: &mut Link,
    control: Control,
    http: &reqwest::Client,
    base: &str,
    actors_tx: &mpsc::Sender<Result<Vec<ActorEntry>, String>>,
) {
    let outputs = match session.control(control) {
        Ok(outputs) => outputs,
        // User-facing prompt, so it goes to the terminal rather than the log.
        // The controller has already recorded it in the view.
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    for output in outputs {
        match output {
            Output::Send(cmd) => {
                if let Err(e) = link.send(&cmd).await {
                    error!(error = %format!("{e:#}"), "command not sent");
                }
            }
            Output::FetchActors => {
                let http = http.clone();
                let base = base.to_string();
                let tx = actors_tx.clone();
                tokio::spawn(async move {
                    let result = fetch::fetch_actors(&http, &base)
                        .await
                        .map_err(|e| format!("{e:#}"));
                    let _ = tx.send(result).await;
                });
            }
        }
    }
}

/// Runs the client until the connection closes or `shutdown` resolves, and
/// hands back the final session.
///
/// Inbound frames are handled strictly in arrival order on this one task. A
/// state update for an unknown drone ends the run with an error.
pub async fn run(
    config: ClientConfig,
    mut inputs: mpsc::Receiver<UserInput>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<Session<HeadlessScene>> {
    let http = fetch::http_client(config.http_timeout())?;
    let base = config.base_url().to_string();
    let ws_url = config.ws_url()?;

    let (publisher, mut config_signal) = fetch::config_signal();
    {
        let http = http.clone();
        let base = base.clone();
        tokio::spawn(async move {
            publisher.publish(fetch::fetch_server_config(&http, &base).await);
        });
    }

    let mut session = Session::new(HeadlessScene::new(), config.session_options());
    let (mut link, mut inbox) = connect(&ws_url).await?;
    let (actors_tx, mut actors_rx) = mpsc::channel(4);

    if let Some(mode) = config.start {
        apply_control(
            &mut session,
            &mut link,
            Control::StartTraining(mode),
            &http,
            &base,
            &actors_tx,
        )
        .await;
    }

    tokio::pin!(shutdown);
    let mut config_applied = false;
    let mut inputs_open = true;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                link.close().await;
                break;
            }
            frame = inbox.next() => match classify(frame) {
                Incoming::Text(text) => session
                    .handle_text(&text)
                    .context("inbound message broke the entity mirror")?,
                Incoming::Ignored => {}
                Incoming::Closed { clean } => {
                    link.mark_closed(clean);
                    session.on_disconnect(clean);
                    break;
                }
            },
            loaded = config_signal.wait(), if !config_applied => {
                config_applied = true;
                match loaded {
                    Ok(cfg) => session.on_config_loaded(&cfg),
                    Err(e) => warn!(error = %format!("{e:#}"), "server config never arrived"),
                }
            }
            Some(actors) = actors_rx.recv() => session.on_actors(actors),
            input = inputs.recv(), if inputs_open => match input {
                Some(UserInput::Control(control)) => {
                    apply_control(&mut session, &mut link, control, &http, &base, &actors_tx).await;
                }
                Some(UserInput::ShowStatus) => log_status(&session),
                None => inputs_open = false,
            },
        }
    }
    log_status(&session);
    Ok(session)
}
