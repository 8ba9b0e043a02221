//! One-shot commands that sit beside the stream

use std::error::Error;

use crate::api::{CancelResponse, DirectChatSupport, RecoveredContent, SearchEnginesResponse};
use crate::core::client::ChatClient;

pub async fn run_content(client: &ChatClient, subtask_id: i64) -> Result<(), Box<dyn Error>> {
    let recovered = client.streaming_content(subtask_id).await?;
    print!("{}", format_content(subtask_id, &recovered));
    Ok(())
}

pub async fn run_cancel(
    client: &ChatClient,
    subtask_id: i64,
    partial: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let response = client.cancel(subtask_id, partial).await?;
    println!("{}", format_cancel(subtask_id, &response));
    if response.success {
        Ok(())
    } else {
        Err(format!("Subtask {subtask_id} was not cancelled").into())
    }
}

pub async fn run_engines(client: &ChatClient) -> Result<(), Box<dyn Error>> {
    let engines = client.search_engines().await?;
    print!("{}", format_engines(&engines));
    Ok(())
}

pub async fn run_check(client: &ChatClient, team_id: i64) -> Result<(), Box<dyn Error>> {
    let support = client.check_direct_chat(team_id).await?;
    println!("{}", format_direct_chat(team_id, &support));
    Ok(())
}

fn format_content(subtask_id: i64, recovered: &RecoveredContent) -> String {
    let mut out = format!(
        "Subtask {subtask_id} (source: {}, streaming: {}",
        recovered.source.as_str(),
        if recovered.streaming { "yes" } else { "no" }
    );
    if !recovered.status.is_empty() {
        out.push_str(&format!(", status: {}", recovered.status));
    }
    if recovered.incomplete {
        out.push_str(", incomplete");
    }
    out.push_str(")\n\n");
    out.push_str(&recovered.content);
    if !recovered.content.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn format_cancel(subtask_id: i64, response: &CancelResponse) -> String {
    let mark = if response.success { "✅" } else { "❌" };
    if response.message.is_empty() {
        format!("{mark} Cancel request for subtask {subtask_id}")
    } else {
        format!("{mark} {}", response.message)
    }
}

fn format_engines(engines: &SearchEnginesResponse) -> String {
    if !engines.enabled {
        return "Web search is disabled on this server.\n".to_string();
    }
    if engines.engines.is_empty() {
        return "Web search is enabled, but no engines are configured.\n".to_string();
    }
    let width = engines
        .engines
        .iter()
        .map(|engine| engine.name.len())
        .max()
        .unwrap_or(0);
    let mut out = String::from("Available search engines:\n");
    for engine in &engines.engines {
        out.push_str(&format!(
            "  {:width$}  {}\n",
            engine.name, engine.display_name
        ));
    }
    out
}

fn format_direct_chat(team_id: i64, support: &DirectChatSupport) -> String {
    if support.supports_direct_chat {
        format!(
            "✅ Team {team_id} supports direct chat (shell: {})",
            support.shell_type
        )
    } else {
        format!(
            "❌ Team {team_id} does not support direct chat (shell: {})",
            support.shell_type
        )
    }
}
