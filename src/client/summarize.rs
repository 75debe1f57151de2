// src/client/summarize.rs
// Single-shot document summary

use futures::StreamExt;
use tracing::warn;

use super::{ClientError, JurisClient, TextDecoder};

/// Shown in place of the summary when anything goes wrong
pub const SUMMARY_FAILURE: &str = "Failed to summarize the document.";

pub struct Summarizer {
    client: JurisClient,
    summary: String,
    loading: bool,
}

impl Summarizer {
    pub fn new(client: JurisClient) -> Self {
        Self {
            client,
            summary: String::new(),
            loading: false,
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Request a summary and report the text accumulated so far after every
    /// chunk. An empty document sends nothing.
    pub async fn summarize<F>(&mut self, document: &str, mut on_update: F) -> Result<(), ClientError>
    where
        F: FnMut(&str),
    {
        if document.is_empty() {
            return Ok(());
        }

        self.loading = true;
        self.summary.clear();

        let result = self.read_summary(document, &mut on_update).await;
        if let Err(e) = &result {
            warn!("Summary failed: {}", e);
            self.summary = SUMMARY_FAILURE.to_string();
            on_update(&self.summary);
        }

        self.loading = false;
        result
    }

    async fn read_summary<F>(&mut self, document: &str, on_update: &mut F) -> Result<(), ClientError>
    where
        F: FnMut(&str),
    {
        let mut stream = self.client.summarize_stream(document).await?;
        let mut decoder = TextDecoder::new();

        while let Some(chunk) = stream.next().await {
            let text = decoder.decode(&chunk?);
            if !text.is_empty() {
                self.summary.push_str(&text);
                on_update(&self.summary);
            }
        }

        let rest = decoder.finish();
        if !rest.is_empty() {
            self.summary.push_str(&rest);
            on_update(&self.summary);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_document_sends_nothing() {
        let mut summarizer = Summarizer::new(JurisClient::new("http://127.0.0.1:9"));
        summarizer
            .summarize("", |_| panic!("no update expected"))
            .await
            .unwrap();
        assert!(summarizer.summary().is_empty());
        assert!(!summarizer.is_loading());
    }

    #[tokio::test]
    async fn test_transport_failure_sets_fixed_message() {
        let mut summarizer = Summarizer::new(JurisClient::new("http://127.0.0.1:9"));
        let mut updates = Vec::new();

        let result = summarizer
            .summarize("Lease agreement", |s| updates.push(s.to_string()))
            .await;

        assert!(result.is_err());
        assert_eq!(summarizer.summary(), SUMMARY_FAILURE);
        assert_eq!(updates.last().map(String::as_str), Some(SUMMARY_FAILURE));
        assert!(!summarizer.is_loading());
    }
}
