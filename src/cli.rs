//! CLI surface — single-shot stdin/stdout prompt.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::config::NotionConfig;
use crate::notion::{NotionClient, TableClient};
use crate::submission::{SubmissionHandler, new_last_written};

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Option<String> {
    match lines.next_line().await {
        Ok(Some(line)) => Some(line.trim().to_string()),
        Ok(None) => None, // EOF
        Err(e) => {
            tracing::error!("Error reading stdin: {}", e);
            None
        }
    }
}

/// Ask for one message, store it, print the outcome.
pub async fn run_prompt(config: &NotionConfig) -> anyhow::Result<()> {
    eprintln!("📓 notion-relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("{}", "=".repeat(40));

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    eprint!("Do you want to write? (yes/no): ");
    let answer = read_line(&mut lines).await.unwrap_or_default();
    if !answer.eq_ignore_ascii_case("yes") {
        eprintln!("👋 Goodbye! No message stored in database.");
        return Ok(());
    }

    eprint!("Message: ");
    let Some(message) = read_line(&mut lines).await.filter(|m| !m.is_empty()) else {
        eprintln!("❌ No message provided.");
        return Ok(());
    };

    let client: Arc<dyn TableClient> = Arc::new(NotionClient::new(config.token.clone()));
    let handler = SubmissionHandler::new(client, config, new_last_written());

    eprintln!("📝 Storing message in Notion database...");
    match handler.submit(&message).await {
        Ok(outcome) => {
            if outcome.is_mastercode {
                eprintln!("✅ Master code applied to the previous record!");
            } else {
                eprintln!("✅ Successfully stored message in Notion database!");
            }
            eprintln!("Page ID: {}", outcome.page_id);
        }
        Err(e) => {
            eprintln!("❌ Error storing in Notion database: {e}");
        }
    }
    Ok(())
}

/// Connectivity check: verify the token by fetching the integration user.
pub async fn run_check(config: &NotionConfig) -> anyhow::Result<()> {
    eprintln!("🔍 Testing Notion API connection...");
    let client = NotionClient::new(config.token.clone());
    match client.me().await {
        Ok(user) => {
            let name = user
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("Unknown");
            eprintln!("✅ Notion API connection successful");
            eprintln!("User: {name}");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Notion API connection failed: {e}");
            std::process::exit(1);
        }
    }
}
