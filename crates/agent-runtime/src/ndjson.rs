//! Newline-delimited JSON decoding for streamed response bodies.
//!
//! Network chunks do not line up with JSON lines, so bytes are buffered
//! until a full line is available.

use agent_core::error::{AgentError, Result};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;

struct LineBuffer<S> {
    bytes: S,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl<S> LineBuffer<S> {
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}

/// Decode a byte stream into one `T` per non-blank line.
///
/// A trailing line without a newline is still decoded. A transport error is
/// yielded once and ends the stream.
pub(crate) fn decode<S, B, T>(bytes: S) -> impl Stream<Item = Result<T>> + Send
where
    S: Stream<Item = Result<B>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    T: DeserializeOwned + Send + 'static,
{
    let state = LineBuffer {
        bytes,
        buffer: Vec::new(),
        exhausted: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.next_line() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let item = serde_json::from_slice::<T>(&line)
                    .map_err(|e| AgentError::Parse(format!("invalid stream line: {e}")));
                return Some((item, state));
            }

            if state.exhausted {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.exhausted = true;
                    state.buffer.clear();
                    return Some((Err(e), state));
                }
                None => {
                    state.exhausted = true;
                    if !state.buffer.is_empty() {
                        state.buffer.push(b'\n');
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn decode_all(chunks: Vec<Result<&'static [u8]>>) -> Vec<Result<Value>> {
        decode::<_, _, Value>(futures::stream::iter(chunks))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let items = decode_all(vec![
            Ok(b"{\"n\":".as_slice()),
            Ok(b"1}\n{\"n\"".as_slice()),
            Ok(b":2}\n\n".as_slice()),
            Ok(b"{\"n\":3}".as_slice()),
        ])
        .await;

        let values: Vec<Value> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            values,
            vec![
                serde_json::json!({"n": 1}),
                serde_json::json!({"n": 2}),
                serde_json::json!({"n": 3}),
            ]
        );
    }

    #[tokio::test]
    async fn test_crlf_and_blank_lines() {
        let items = decode_all(vec![Ok(b"\r\n{\"n\":1}\r\n  \n".as_slice())]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap()["n"], 1);
    }

    #[tokio::test]
    async fn test_bad_line_is_reported_and_decoding_continues() {
        let items = decode_all(vec![Ok(b"not json\n{\"n\":2}\n".as_slice())]).await;
        assert!(matches!(items[0], Err(AgentError::Parse(_))));
        assert_eq!(items[1].as_ref().unwrap()["n"], 2);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let items = decode_all(vec![
            Ok(b"{\"n\":1}\n{\"n\"".as_slice()),
            Err(AgentError::ProviderUnavailable("reset".into())),
            Ok(b":2}\n".as_slice()),
        ])
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(AgentError::ProviderUnavailable(_))));
    }
}
