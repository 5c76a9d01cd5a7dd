//! Webhook notifications
//!
//! When a webhook URL is configured, a Discord-style embed is posted when a transfer starts and
//! when it ends. Delivery problems are logged and never affect the transfer.

use crate::summary::{RunResult, Status};

const COLOR_STARTED: u32 = 0x0058_65F2;
const COLOR_SUCCESS: u32 = 0x0057_F287;
const COLOR_WARNING: u32 = 0x00FE_E75C;
const COLOR_ERROR: u32 = 0x00ED_4245;

/// Discord rejects the whole message when a field value is longer than this.
const FIELD_VALUE_LIMIT: usize = 1024;
/// Text inside a code block, leaving room for the fences.
const CODE_BLOCK_LIMIT: usize = 1000;

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

fn code_block(text: &str) -> String {
    format!("```\n{}\n```", truncate(text, CODE_BLOCK_LIMIT))
}

#[derive(Debug, Clone, serde::Serialize)]
struct Payload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Clone, serde::Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
    footer: Footer,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<Field>,
}

#[derive(Debug, Clone, serde::Serialize)]
struct Footer {
    text: String,
}

#[derive(Debug, Clone, serde::Serialize)]
struct Field {
    name: String,
    value: String,
    inline: bool,
}

impl Embed {
    fn new(title: &str, description: String, color: u32) -> Self {
        Self {
            title: title.to_string(),
            description,
            color,
            timestamp: chrono::Utc::now().to_rfc3339(),
            footer: Footer {
                text: "SnapVault".to_string(),
            },
            fields: Vec::new(),
        }
    }

    fn field(mut self, name: &str, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: truncate(&value.into(), FIELD_VALUE_LIMIT),
            inline,
        });
        self
    }
}

fn started_embed(folder: &str, source: &std::path::Path) -> Embed {
    Embed::new(
        "Photo transfer started",
        format!("Copying **{folder}**"),
        COLOR_STARTED,
    )
    .field("Source", format!("`{}`", source.display()), false)
}

fn finished_embed(folder: &str, result: &RunResult) -> Embed {
    let summary = &result.summary;
    let (title, color) = match result.status() {
        Status::Success => ("Photo transfer completed", COLOR_SUCCESS),
        Status::CompletedWithErrors => ("Photo transfer completed with errors", COLOR_WARNING),
        Status::Cancelled => ("Photo transfer cancelled", COLOR_WARNING),
        Status::Failed => ("Photo transfer failed", COLOR_ERROR),
    };
    let mut embed = Embed::new(title, format!("**{folder}**"), color)
        .field("Photos", summary.files_discovered.to_string(), true)
        .field("Date folders", summary.date_folders.len().to_string(), true)
        .field("Duration", summary.elapsed(), true)
        .field(
            "Copied",
            format!(
                "{} copies, {}",
                summary.copies_completed,
                bytesize::ByteSize(summary.bytes_copied)
            ),
            true,
        );
    if !summary.date_folders.is_empty() {
        let breakdown: Vec<String> = summary
            .date_folders
            .iter()
            .map(|(folder, count)| format!("{folder}: {count}"))
            .collect();
        embed = embed.field("Breakdown", code_block(&breakdown.join("\n")), false);
    }
    if !result.failures.is_empty() {
        embed = embed.field("Failed copies", result.failures.len().to_string(), true);
    }
    if let Some(error) = &result.aborted {
        embed = embed.field("Stopped", error.to_string(), false);
    }
    embed
}

fn failed_embed(folder: &str, error: &str) -> Embed {
    Embed::new(
        "Photo transfer failed",
        format!("**{folder}**"),
        COLOR_ERROR,
    )
    .field("Error", code_block(error), false)
}

pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    #[must_use]
    pub fn new(webhook_url: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            webhook_url: webhook_url
                .filter(|url| !url.is_empty())
                .map(str::to_string),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn started(&self, folder: &str, source: &std::path::Path) {
        self.send(started_embed(folder, source)).await;
    }

    pub async fn finished(&self, folder: &str, result: &RunResult) {
        self.send(finished_embed(folder, result)).await;
    }

    pub async fn failed(&self, folder: &str, error: &str) {
        self.send(failed_embed(folder, error)).await;
    }

    async fn send(&self, embed: Embed) {
        let Some(url) = &self.webhook_url else {
            return;
        };
        let payload = Payload {
            embeds: vec![embed],
        };
        match self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(_) => tracing::debug!("notification delivered"),
            Err(error) => tracing::warn!("failed to send notification: {}", error),
        }
    }
}
