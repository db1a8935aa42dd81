//! HTTP client for league snapshots.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use uuid::Uuid;

use super::connection::TokenSource;
use super::error::{ClientError, ClientResult};
use crate::api::handlers::feed::SNAPSHOT_EVENT;
use crate::domain::league::League;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// Fetches and watches full league records
pub struct LeagueApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl LeagueApiClient {
    /// # Arguments
    /// * `base_url` - Server root, e.g. `http://localhost:3000`
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Manual snapshot refetch
    pub async fn fetch_league(&self, league_id: Uuid) -> ClientResult<League> {
        let response = self.get(&format!("/leagues/{}", league_id)).await?;
        response.json().await.map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Change feed of full snapshots, starting with the current record
    pub async fn watch_league(
        &self,
        league_id: Uuid,
    ) -> ClientResult<impl Stream<Item = ClientResult<League>> + Send + 'static> {
        let response = self.get(&format!("/leagues/{}/feed", league_id)).await?;
        let bytes = Box::pin(response.bytes_stream());

        Ok(stream::unfold((bytes, Vec::new()), |(mut bytes, mut buffer)| async move {
            loop {
                if let Some(frame) = take_frame(&mut buffer) {
                    match parse_snapshot(&frame) {
                        Some(snapshot) => return Some((snapshot, (bytes, buffer))),
                        None => continue,
                    }
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => return Some((Err(ClientError::from(e)), (bytes, buffer))),
                    None => return None,
                }
            }
        }))
    }

    async fn get(&self, path: &str) -> ClientResult<Response> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ErrorBody>(&body) {
            Ok(error) => ClientError::Api {
                status,
                code: error.code,
                message: error.error,
            },
            Err(_) => ClientError::Api {
                status,
                code: "UNKNOWN".to_string(),
                message: body,
            },
        })
    }
}

/// Splits one complete SSE frame off the front of the buffer
fn take_frame(buffer: &mut Vec<u8>) -> Option<String> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let frame: Vec<u8> = buffer.drain(..end + 2).collect();
    Some(String::from_utf8_lossy(&frame[..end]).into_owned())
}

/// Decodes a snapshot frame; comments and other event types yield `None`
fn parse_snapshot(frame: &str) -> Option<ClientResult<League>> {
    let mut event = None;
    let mut data = String::new();

    for line in frame.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if event != Some(SNAPSHOT_EVENT) || data.is_empty() {
        return None;
    }

    Some(serde_json::from_str(&data).map_err(|e| ClientError::Decode(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_on_blank_lines() {
        let mut buffer = b"event: snapshot\ndata: {}\n\n:\n\nevent: snap".to_vec();

        assert_eq!(take_frame(&mut buffer).as_deref(), Some("event: snapshot\ndata: {}"));
        assert_eq!(take_frame(&mut buffer).as_deref(), Some(":"));
        assert_eq!(take_frame(&mut buffer), None);
        assert_eq!(buffer, b"event: snap");
    }

    #[test]
    fn keep_alive_comments_are_skipped() {
        assert!(parse_snapshot(":").is_none());
        assert!(parse_snapshot("event: other\ndata: {}").is_none());
    }

    #[test]
    fn malformed_snapshot_is_a_decode_error() {
        let result = parse_snapshot("event: snapshot\ndata: {\"id\": 1}\nid: 3");
        assert!(matches!(result, Some(Err(ClientError::Decode(_)))));
    }
}
