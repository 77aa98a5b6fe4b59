//! Metadata queries against the media extractor
//!
//! Both queries run the extractor in JSON-lines mode (one JSON object per
//! line on stdout) and map each entry onto a [`SearchResult`].

use crate::config::ExtractorSettings;
use crate::services::pipeline::{Stage, ToolError};
use flashtune_core::{PlaylistInfo, SearchResult};
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

const PARSE_FAILURE: &str = "Failed to parse extractor output";

#[derive(Debug, Clone)]
pub struct Extractor {
    program: String,
    search_results: u32,
}

impl Extractor {
    pub fn new(program: impl Into<String>, search_results: u32) -> Self {
        Self {
            program: program.into(),
            search_results: search_results.max(1),
        }
    }

    pub fn from_settings(settings: &ExtractorSettings) -> Self {
        Self::new(&settings.program, settings.search_results)
    }

    /// Search for tracks matching `query`
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ToolError> {
        let args = vec![
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-download".to_string(),
            "--no-playlist".to_string(),
            "--".to_string(),
            format!("ytsearch{}:{}", self.search_results, query.trim()),
        ];

        let entries = self.collect_json_lines(&args, "search failed").await?;
        Ok(downloadable(&entries))
    }

    /// Flat listing of a remote playlist
    ///
    /// The title comes from the first entry's `playlist_title`.
    #[instrument(skip(self))]
    pub async fn playlist_info(&self, url: &str) -> Result<PlaylistInfo, ToolError> {
        let args = vec![
            "--flat-playlist".to_string(),
            "--dump-json".to_string(),
            "--no-download".to_string(),
            "--".to_string(),
            url.trim().to_string(),
        ];

        let entries = self
            .collect_json_lines(&args, "failed to fetch playlist info")
            .await?;

        let title = entries
            .first()
            .map(|first| text(first.get("playlist_title")))
            .unwrap_or_default();
        Ok(PlaylistInfo::new(title, downloadable(&entries)))
    }

    async fn collect_json_lines(
        &self,
        args: &[String],
        fallback: &str,
    ) -> Result<Vec<Value>, ToolError> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError::from_spawn(Stage::Extractor, &self.program, &e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let stderr = stderr.trim();
            return Err(ToolError::ExtractorFailed {
                code: output.status.code(),
                stderr: if stderr.is_empty() {
                    fallback.to_string()
                } else {
                    stderr.to_string()
                },
            });
        }
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "Extractor wrote to stderr");
        }

        parse_json_lines(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse one JSON object per non-blank line
pub fn parse_json_lines(stdout: &str) -> Result<Vec<Value>, ToolError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| {
                debug!(error = %e, "Unparseable extractor line");
                ToolError::MalformedOutput(PARSE_FAILURE.to_string())
            })
        })
        .collect()
}

/// Entries that carry a source locator; the rest cannot be downloaded
fn downloadable(entries: &[Value]) -> Vec<SearchResult> {
    entries
        .iter()
        .map(parse_entry)
        .filter(|result| !result.source_url.trim().is_empty())
        .collect()
}

/// Map an extractor entry onto a search result
///
/// Missing fields become empty strings, the artist is `uploader` or else
/// `channel`, and the duration (seconds, possibly fractional) becomes non-negative milliseconds.
pub fn parse_entry(entry: &Value) -> SearchResult {
    SearchResult {
        title: text(entry.get("title")),
        artist: text(first_present(entry, &["uploader", "channel"])),
        duration_ms: duration_ms(entry.get("duration")),
        thumbnail_url: text(entry.get("thumbnail")),
        source_url: text(first_present(entry, &["webpage_url", "url"])),
    }
}

/// First key whose value is present and not null
fn first_present<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find(|value| !value.is_null())
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

fn duration_ms(value: Option<&Value>) -> i64 {
    let seconds = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_entry() {
        let entry = json!({
            "title": "Song",
            "uploader": "Band",
            "duration": 213.5,
            "thumbnail": "https://img.example.com/t.jpg",
            "webpage_url": "https://example.com/watch?v=1",
            "url": "https://cdn.example.com/1"
        });

        let result = parse_entry(&entry);
        assert_eq!(result.title, "Song");
        assert_eq!(result.artist, "Band");
        assert_eq!(result.duration_ms, 213_500);
        assert_eq!(result.thumbnail_url, "https://img.example.com/t.jpg");
        assert_eq!(result.source_url, "https://example.com/watch?v=1");
    }

    #[test]
    fn test_parse_sparse_entry() {
        let entry = json!({
            "title": null,
            "channel": " Channel ",
            "duration": -4,
            "webpage_url": null,
            "url": "https://example.com/watch?v=2"
        });

        let result = parse_entry(&entry);
        assert_eq!(result.title, "");
        assert_eq!(result.artist, "Channel");
        assert_eq!(result.duration_ms, 0);
        assert_eq!(result.thumbnail_url, "");
        assert_eq!(result.source_url, "https://example.com/watch?v=2");
    }

    #[test]
    fn test_entries_without_source_are_dropped() {
        let entries = vec![
            json!({"title": "kept", "url": "https://example.com/1"}),
            json!({"title": "no source"}),
            json!({"title": "blank", "webpage_url": ""}),
        ];

        let results = downloadable(&entries);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "kept");
    }

    #[test]
    fn test_duration_from_string() {
        assert_eq!(duration_ms(Some(&json!("12"))), 12_000);
        assert_eq!(duration_ms(Some(&json!("n/a"))), 0);
        assert_eq!(duration_ms(None), 0);
    }

    #[test]
    fn test_parse_json_lines() {
        let lines = "{\"title\":\"a\"}\n\n  {\"title\":\"b\"}\n";
        let values = parse_json_lines(lines).unwrap();
        assert_eq!(values.len(), 2);

        let err = parse_json_lines("{\"title\":\"a\"}\nnot json\n").unwrap_err();
        assert_eq!(err, ToolError::MalformedOutput(PARSE_FAILURE.to_string()));
    }
}
