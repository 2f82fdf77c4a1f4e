//! Pass-through stream wrapper
//!
//! Forwards an upstream event stream frame by frame while a
//! [`StreamAccumulator`] builds the merged message; on clean end of stream the
//! message is handed to the [`ReasoningCache`].

use crate::services::accumulator::StreamAccumulator;
use crate::services::reasoning_cache::ReasoningCache;
use bytes::Bytes;
use futures::{ready, Stream};
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, warn};

pin_project! {
    /// Event stream wrapper that remembers the completed message.
    ///
    /// Upstream errors are yielded unchanged and disable caching; dropping the
    /// wrapper before the upstream ends never caches either.
    pub struct ReasoningStream<S, E> {
        #[pin]
        inner: S,
        accumulator: Option<StreamAccumulator>,
        pending: VecDeque<Bytes>,
        error: Option<E>,
        cache: Arc<ReasoningCache>,
        finished: bool,
    }
}

impl<S, E> ReasoningStream<S, E>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    pub fn new(inner: S, cache: Arc<ReasoningCache>) -> Self {
        Self {
            inner,
            accumulator: Some(StreamAccumulator::new()),
            pending: VecDeque::new(),
            error: None,
            cache,
            finished: false,
        }
    }
}

impl<S, E> Stream for ReasoningStream<S, E>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if let Some(e) = this.error.take() {
                return Poll::Ready(Some(Err(e)));
            }
            if *this.finished {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => match this.accumulator.as_mut() {
                    Some(accumulator) => this.pending.extend(accumulator.feed(&chunk)),
                    None => this.pending.push_back(chunk),
                },
                Some(Err(e)) => {
                    if let Some(accumulator) = this.accumulator.take() {
                        warn!("Upstream stream failed, discarding partial message");
                        this.pending.extend(accumulator.finish().trailing);
                    }
                    *this.error = Some(e);
                }
                None => {
                    *this.finished = true;
                    if let Some(accumulator) = this.accumulator.take() {
                        let finished = accumulator.finish();
                        this.pending.extend(finished.trailing);
                        if finished.message.is_cacheable() {
                            this.cache.remember(&finished.message);
                        } else {
                            debug!("📦 Streamed message has no extra fields - skipping cache");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use futures::{stream, StreamExt};
    use serde_json::json;

    fn chunks(parts: &[&str]) -> Vec<Result<Bytes, String>> {
        parts
            .iter()
            .map(|part| Ok(Bytes::copy_from_slice(part.as_bytes())))
            .collect()
    }

    const REASONING_STREAM: [&str; 3] = [
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"reasoning\":\"think\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"X\"}}]}\n\ndata: [DO",
        "NE]\n\n",
    ];

    #[tokio::test]
    async fn test_clean_end_remembers() {
        let cache = Arc::new(ReasoningCache::with_default_ttl());
        let wrapped = ReasoningStream::new(stream::iter(chunks(&REASONING_STREAM)), cache.clone());

        let output: Vec<Bytes> = wrapped.map(|item| item.unwrap()).collect().await;
        assert_eq!(output.concat(), REASONING_STREAM.concat().as_bytes());
        assert_eq!(output.len(), 3);

        let outgoing = Message::from_value(&json!({"role": "assistant", "content": "X"})).unwrap();
        let fields = cache.lookup_and_strip(&outgoing).unwrap();
        assert_eq!(fields["reasoning"], "think");
    }

    #[tokio::test]
    async fn test_upstream_error_skips_remember() {
        let cache = Arc::new(ReasoningCache::with_default_ttl());
        let mut items = chunks(&REASONING_STREAM[..2]);
        items.push(Err("connection reset".to_string()));
        let wrapped = ReasoningStream::new(stream::iter(items), cache.clone());

        let output: Vec<Result<Bytes, String>> = wrapped.collect().await;
        assert_eq!(output.len(), 4);
        // The partial "data: [DO" is flushed before the error
        assert_eq!(output[2].as_ref().unwrap().as_ref(), b"data: [DO");
        assert_eq!(output[3].as_ref().unwrap_err(), "connection reset");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_stream_skips_remember() {
        let cache = Arc::new(ReasoningCache::with_default_ttl());
        let mut wrapped =
            ReasoningStream::new(stream::iter(chunks(&REASONING_STREAM)), cache.clone());

        let first = wrapped.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"data: "));
        drop(wrapped);
        assert!(cache.is_empty());
    }
}
