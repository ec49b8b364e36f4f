use serde_json::Value;
use tokio_util::sync::CancellationToken;
use txnative::{
    CdsClient, Config, JobPoller, LocaleStrings, Parser, PushMeta, PushPayload, StringInfo,
    TxJobStatus, types::LocaleDocument,
};

use crate::validation::validate_file_path;

/// Reads source strings from a JSON file.
///
/// Accepts a storage document (`{"data": {key: {"string": ..}}}`) or a flat
/// map whose values are either plain text or `{"string": ..}` objects.
pub fn read_source_file(path: &str) -> Result<LocaleStrings, String> {
    validate_file_path(path)?;
    let bytes = std::fs::read(path).map_err(|e| format!("Cannot read {}: {}", path, e))?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("Invalid JSON in {}: {}", path, e))?;

    let Value::Object(object) = value else {
        return Err(format!("Expected a JSON object in {}", path));
    };
    if object.get("data").is_some_and(Value::is_object) {
        return LocaleDocument::from_bytes(&bytes)
            .map(|document| document.data)
            .map_err(|e| format!("Invalid document {}: {}", path, e));
    }

    let mut strings = LocaleStrings::new();
    for (key, value) in object {
        match value {
            Value::String(text) => {
                strings.insert(key, StringInfo::new(text));
            }
            Value::Object(_) => match serde_json::from_value::<StringInfo>(value) {
                Ok(info) => {
                    strings.insert(key, info);
                }
                Err(e) => tracing::warn!(key = %key, file = path, "Skipping entry: {}", e),
            },
            _ => tracing::warn!(key = %key, file = path, "Skipping entry that is not text"),
        }
    }
    Ok(strings)
}

/// Merges every file into one payload. Later files win on duplicate keys.
pub fn build_payload(
    files: &[String],
    append_tags: &[String],
    purge: bool,
) -> Result<PushPayload, String> {
    let mut data = LocaleStrings::new();
    for file in files {
        for (key, mut info) in read_source_file(file)? {
            info.append_tags(append_tags.iter().cloned());
            if data.insert(key.clone(), info).is_some() {
                tracing::debug!(key = %key, file = %file, "Duplicate key overrides earlier file");
            }
        }
    }
    Ok(PushPayload::new(
        data,
        PushMeta {
            purge,
            ..PushMeta::default()
        },
    ))
}

/// Pushes `payload` and waits for the job, cancelling polling on Ctrl-C.
pub async fn run_push(config: &Config, payload: &PushPayload) -> Result<TxJobStatus, String> {
    let client = CdsClient::from_config(config).map_err(|e| e.to_string())?;
    let poller = JobPoller::from_config(&config.polling);
    let cancel = CancellationToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted, no longer waiting for the push job");
                cancel.cancel();
            }
        })
    };
    let result = client.push_and_wait(payload, &poller, &cancel).await;
    watcher.abort();

    result.map_err(|e| {
        let mut message = e.to_string();
        for error in e.job_errors() {
            message.push_str(&format!("\n  - {}", error));
        }
        message
    })
}

pub fn print_job_summary(status: &TxJobStatus) {
    let details = &status.details;
    println!("Push job {} completed", status.job_id);
    println!("  created: {}", details.created);
    println!("  updated: {}", details.updated);
    println!("  skipped: {}", details.skipped);
    println!("  deleted: {}", details.deleted);
    println!("  failed:  {}", details.failed);
    for error in &status.errors {
        println!("  warning: {}", error);
    }
}
