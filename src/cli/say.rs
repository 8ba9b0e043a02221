//! Streaming commands: `say` and `resume`

use std::error::Error;
use std::io::{self, Write};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::StreamRequest;
use crate::core::cancellation::StreamCancel;
use crate::core::chat_stream::{ChatStreamService, SessionOutcome, StreamMessage};
use crate::core::client::ChatClient;
use crate::core::resume::ResumeParams;
use crate::core::transcript::Transcript;
use crate::utils::logging::TranscriptLog;

/// What the printer saw by the time the session ended.
struct Printed {
    outcome: SessionOutcome,
    transcript: Transcript,
    subtask_id: Option<i64>,
}

pub async fn run_say(
    client: &ChatClient,
    request: StreamRequest,
    log: &TranscriptLog,
    stop_on_interrupt: bool,
) -> Result<(), Box<dyn Error>> {
    if request.message.trim().is_empty() {
        return Err("Message text is empty".into());
    }
    log.log_entry("You", &request.message)?;

    let (service, mut rx) = ChatStreamService::new();
    let (interrupt, watcher) = interrupt_watcher();

    let opened = client
        .stream_with_cancel(request, StreamCancel::child_of(&interrupt), service.sink(0))
        .await;
    drop(service);
    let handle = match opened {
        Ok(handle) => handle,
        Err(err) => {
            watcher.abort();
            return Err(err.into());
        }
    };
    debug!(task_id = ?handle.task_id, subtask_id = ?handle.subtask_id, "stream opened");

    let printed = print_stream(&mut rx, Transcript::new(), handle.subtask_id).await;
    watcher.abort();
    finish(client, printed?, log, stop_on_interrupt).await
}

pub async fn run_resume(
    client: &ChatClient,
    mut params: ResumeParams,
    recover: bool,
    log: &TranscriptLog,
    stop_on_interrupt: bool,
) -> Result<(), Box<dyn Error>> {
    let transcript = if recover {
        let recovered = client.streaming_content(params.subtask_id).await?;
        print!("{}", recovered.content);
        io::stdout().flush()?;
        if !recovered.streaming {
            println!();
            eprintln!(
                "ℹ️  Subtask {} is not streaming (status: {}, source: {}){}",
                params.subtask_id,
                display_status(&recovered.status),
                recovered.source.as_str(),
                if recovered.incomplete {
                    "; the answer is incomplete"
                } else {
                    ""
                }
            );
            log.log_entry("Recovered", &recovered.content)?;
            return Ok(());
        }
        let transcript = Transcript::from_rendered(recovered.content);
        params.offset = transcript.offset();
        transcript
    } else {
        Transcript::resumed_at(params.offset)
    };

    let (service, mut rx) = ChatStreamService::new();
    let (interrupt, watcher) = interrupt_watcher();
    let cancel = StreamCancel::child_of(&interrupt);

    let opened = client
        .resume_with_cancel(&params, cancel, service.sink(params.subtask_id as u64))
        .await;
    drop(service);
    if let Err(err) = opened {
        watcher.abort();
        return Err(err.into());
    }

    let printed = print_stream(&mut rx, transcript, Some(params.subtask_id)).await;
    watcher.abort();
    finish(client, printed?, log, stop_on_interrupt).await
}

/// Root token tripped by the first Ctrl+C; sessions hang child triggers off it.
fn interrupt_watcher() -> (CancellationToken, tokio::task::JoinHandle<()>) {
    let root = CancellationToken::new();
    let trigger = root.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    (root, watcher)
}

async fn print_stream(
    rx: &mut mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    mut transcript: Transcript,
    mut subtask_id: Option<i64>,
) -> io::Result<Printed> {
    let mut stdout = io::stdout();
    let outcome = loop {
        match rx.recv().await {
            Some((StreamMessage::Event(event), _)) => {
                if event.subtask_id.is_some() {
                    subtask_id = event.subtask_id;
                }
                let fresh = transcript.apply(&event);
                if !fresh.is_empty() {
                    write!(stdout, "{fresh}")?;
                    stdout.flush()?;
                }
            }
            Some((
                StreamMessage::Complete {
                    subtask_id: completed,
                    ..
                },
                _,
            )) => {
                if completed.is_some() {
                    subtask_id = completed;
                }
            }
            Some((StreamMessage::Error(failure), _)) => {
                eprintln!("\n❌ Error: {failure}");
            }
            Some((StreamMessage::End(outcome), _)) => break outcome,
            None => break SessionOutcome::Ended,
        }
    };

    if !transcript.is_empty() {
        println!();
    }
    Ok(Printed {
        outcome,
        transcript,
        subtask_id,
    })
}

async fn finish(
    client: &ChatClient,
    printed: Printed,
    log: &TranscriptLog,
    stop_on_interrupt: bool,
) -> Result<(), Box<dyn Error>> {
    if !printed.transcript.is_empty() {
        log.log_entry("Assistant", printed.transcript.text())?;
    }

    match printed.outcome {
        SessionOutcome::Completed => Ok(()),
        SessionOutcome::Errored => Err("The answer ended with an error".into()),
        SessionOutcome::Cancelled => {
            let Some(subtask_id) = printed.subtask_id else {
                eprintln!("⚠️  Interrupted before the server assigned a subtask");
                return Ok(());
            };
            if stop_on_interrupt {
                let partial = match cancel_partial(client, subtask_id, &printed.transcript).await {
                    Ok(partial) => partial,
                    Err(reason) => {
                        warn!(subtask_id, %reason, "skipping server cancel");
                        eprintln!("⚠️  Not stopping subtask {subtask_id}: {reason}");
                        print_resume_hint(subtask_id, printed.transcript.offset());
                        return Ok(());
                    }
                };
                let response = client.cancel(subtask_id, partial).await?;
                if response.success {
                    eprintln!("🛑 Stopped subtask {subtask_id}");
                } else {
                    eprintln!("⚠️  Server did not stop subtask {subtask_id}: {}", response.message);
                }
            } else {
                eprintln!("⏸️  Interrupted. The answer keeps generating on the server.");
                print_resume_hint(subtask_id, printed.transcript.offset());
            }
            Ok(())
        }
        SessionOutcome::Ended => {
            eprintln!("⚠️  The stream closed before the answer was complete");
            if let Some(subtask_id) = printed.subtask_id {
                print_resume_hint(subtask_id, printed.transcript.offset());
            }
            Ok(())
        }
    }
}

/// Full answer to keep on the server. The cancel replaces the stored result,
/// so text before a bare `--offset` resume is fetched back first.
async fn cancel_partial(
    client: &ChatClient,
    subtask_id: i64,
    transcript: &Transcript,
) -> Result<Option<String>, String> {
    let start = transcript.start();
    if start == 0 {
        return Ok(Some(transcript.text().to_string()).filter(|text| !text.is_empty()));
    }

    let recovered = client
        .streaming_content(subtask_id)
        .await
        .map_err(|err| format!("could not recover the first {start} characters ({err})"))?;
    let limit = usize::try_from(start).unwrap_or(usize::MAX);
    let prefix: String = recovered.content.chars().take(limit).collect();
    if (prefix.chars().count() as u64) < start {
        return Err(format!(
            "the server only holds {} of the first {start} characters",
            prefix.chars().count()
        ));
    }
    Ok(Some(prefix + transcript.text()))
}

fn print_resume_hint(subtask_id: i64, offset: u64) {
    eprintln!("💡 Continue with: chatrelay resume {subtask_id} --offset {offset}");
}

fn display_status(status: &str) -> &str {
    if status.is_empty() {
        "unknown"
    } else {
        status
    }
}
