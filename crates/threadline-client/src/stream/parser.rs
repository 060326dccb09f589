use bytes::Bytes;
use futures::stream::{AbortHandle, AbortRegistration, Abortable, Stream, StreamExt};
use std::pin::Pin;
use std::str::Utf8Error;

use super::buffering::LineBuffer;
use super::decoder::FrameDecoder;
use super::frames::{Frame, WireFormat};
use crate::error::StreamError;

/// Body stream after cancellation has been wired in
pub type CancellableBody = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Receives progress while a stream is consumed
pub trait StreamObserver: Send {
    /// Called after every text fragment with the full text so far
    fn on_update(&mut self, accumulated: &str);

    fn on_metadata(&mut self, _thread_id: Option<&str>, _message_id: Option<&str>) {}

    /// Called once before an error is returned to the caller
    fn on_error(&mut self, _error: &StreamError) {}
}

/// Observer that only cares about text updates
pub struct FnObserver<F>(F);

pub fn observe_fn<F>(f: F) -> FnObserver<F>
where
    F: FnMut(&str) + Send,
{
    FnObserver(f)
}

impl<F> StreamObserver for FnObserver<F>
where
    F: FnMut(&str) + Send,
{
    fn on_update(&mut self, accumulated: &str) {
        (self.0)(accumulated)
    }
}

pub struct NoopObserver;

impl StreamObserver for NoopObserver {
    fn on_update(&mut self, _accumulated: &str) {}
}

/// Result of a fully consumed stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Accumulated text, trimmed
    pub text: String,
    pub thread_id: Option<String>,
    pub message_id: Option<String>,
    /// Whether an explicit end marker was seen
    pub terminated: bool,
}

/// Incremental decoder state: bytes in, accumulated text out
pub struct StreamParser {
    decoder: Box<dyn FrameDecoder>,
    buffer: LineBuffer,
    accumulated: String,
    thread_id: Option<String>,
    message_id: Option<String>,
    terminated: bool,
}

impl StreamParser {
    pub fn new(format: WireFormat) -> Self {
        Self::with_decoder(format.decoder())
    }

    pub fn with_decoder(decoder: Box<dyn FrameDecoder>) -> Self {
        Self {
            decoder,
            buffer: LineBuffer::with_capacity(4096),
            accumulated: String::new(),
            thread_id: None,
            message_id: None,
            terminated: false,
        }
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Feed one chunk. Every complete line is decoded; a partial trailing
    /// line waits for the next chunk. Input after the end marker is ignored.
    pub fn feed(
        &mut self,
        bytes: &[u8],
        observer: &mut dyn StreamObserver,
    ) -> Result<(), StreamError> {
        if self.terminated {
            return Ok(());
        }

        self.buffer.extend(bytes);

        while let Some(line) = self.buffer.next_line() {
            self.handle_line(line, observer)?;
            if self.terminated {
                break;
            }
        }

        Ok(())
    }

    /// Input is exhausted: decode a trailing line that had no newline
    pub fn finish(mut self, observer: &mut dyn StreamObserver) -> Result<StreamOutcome, StreamError> {
        if !self.terminated {
            if let Some(line) = self.buffer.take_remainder() {
                self.handle_line(line, observer)?;
            }
        }

        Ok(StreamOutcome {
            text: self.accumulated.trim().to_string(),
            thread_id: self.thread_id,
            message_id: self.message_id,
            terminated: self.terminated,
        })
    }

    fn handle_line(
        &mut self,
        line: Result<String, Utf8Error>,
        observer: &mut dyn StreamObserver,
    ) -> Result<(), StreamError> {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "skipping line with invalid UTF-8");
                return Ok(());
            }
        };

        if line.is_empty() {
            return Ok(());
        }

        match self.decoder.decode_line(&line) {
            Some(Frame::Text(fragment)) => {
                if !fragment.is_empty() {
                    self.accumulated.push_str(&fragment);
                    observer.on_update(&self.accumulated);
                }
            }
            Some(Frame::Metadata { thread_id, message_id }) => {
                observer.on_metadata(thread_id.as_deref(), message_id.as_deref());
                if thread_id.is_some() {
                    self.thread_id = thread_id;
                }
                if message_id.is_some() {
                    self.message_id = message_id;
                }
            }
            Some(Frame::Error(message)) => return Err(StreamError::Remote(message)),
            Some(Frame::End) => self.terminated = true,
            None => {}
        }

        Ok(())
    }
}

/// Drive `body` to completion through `parser`.
///
/// Stops reading at the end marker. The body is dropped on every exit path,
/// which releases the underlying connection. Errors are reported to
/// `observer.on_error` (cancellation excepted) and then returned.
pub async fn consume_stream<S, E>(
    body: S,
    mut parser: StreamParser,
    observer: &mut dyn StreamObserver,
) -> Result<StreamOutcome, StreamError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<StreamError>,
{
    let mut body = Box::pin(body);

    while let Some(chunk) = body.next().await {
        let fed = chunk
            .map_err(Into::into)
            .and_then(|bytes| parser.feed(&bytes, observer));

        if let Err(error) = fed {
            if error != StreamError::Cancelled {
                observer.on_error(&error);
            }
            return Err(error);
        }

        if parser.is_terminated() {
            tracing::debug!("end marker received, releasing stream");
            break;
        }
    }

    drop(body);

    parser.finish(observer).map_err(|error| {
        observer.on_error(&error);
        error
    })
}

/// Handle that aborts a body wrapped by [`cancellable`] or [`CancelRegistration::wrap`]
#[derive(Debug, Clone)]
pub struct CancelHandle(AbortHandle);

impl CancelHandle {
    /// A handle armed before its body exists. Cancelling it early makes the
    /// body wrapped later end at once.
    pub fn new_pair() -> (CancelHandle, CancelRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        (CancelHandle(handle), CancelRegistration(registration))
    }

    pub fn cancel(&self) {
        self.0.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_aborted()
    }
}

/// Other half of [`CancelHandle::new_pair`]
#[derive(Debug)]
pub struct CancelRegistration(AbortRegistration);

impl CancelRegistration {
    /// Wrap a body so its handle can abort it. An aborted body yields a
    /// final `StreamError::Cancelled`, even while a read is pending.
    pub fn wrap<S, E>(self, body: S) -> CancellableBody
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<StreamError> + Send + 'static,
    {
        let body = Abortable::new(body, self.0);

        Box::pin(async_stream::stream! {
            let mut body = Box::pin(body);

            while let Some(item) = body.next().await {
                let item: Result<Bytes, StreamError> = item.map_err(Into::into);
                yield item;
            }

            if body.is_aborted() {
                yield Err(StreamError::Cancelled);
            }
        })
    }
}

pub fn cancellable<S, E>(body: S) -> (CancellableBody, CancelHandle)
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    let (handle, registration) = CancelHandle::new_pair();
    (registration.wrap(body), handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> Vec<Result<Bytes, StreamError>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    #[tokio::test]
    async fn test_line_prefixed_updates_and_final_text() {
        let mut updates = Vec::new();
        let body = stream::iter(chunks(&[
            "0:\"hello\"\n",
            "0:\"\\nworld\"\n",
            "e:{\"finishReason\":\"stop\"}\n",
        ]));

        let outcome = consume_stream(
            body,
            StreamParser::new(WireFormat::LinePrefixed),
            &mut observe_fn(|text: &str| updates.push(text.to_string())),
        )
        .await
        .unwrap();

        assert_eq!(updates, vec!["hello".to_string(), "hello\nworld".to_string()]);
        assert_eq!(outcome.text, "hello\nworld");
        assert!(outcome.terminated);
    }

    #[tokio::test]
    async fn test_event_stream_outcome() {
        let body = stream::iter(chunks(&[
            "data: {\"metadata\":{\"thread_id\":\"t-9\",\"message_id\":\"m-1\"}}\n",
            "data: {\"chk\":\"ab\"}\n",
            "data: not json\n",
            "data: {\"chk\":\"cd\"}\n",
            "data: {\"eofs\":true}\n",
        ]));

        let outcome = consume_stream(body, StreamParser::new(WireFormat::EventStream), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(outcome.text, "abcd");
        assert_eq!(outcome.message_id.as_deref(), Some("m-1"));
        assert_eq!(outcome.thread_id.as_deref(), Some("t-9"));
    }

    #[tokio::test]
    async fn test_input_after_end_marker_is_ignored() {
        let body = stream::iter(chunks(&["0:\"a\"\nd:{}\n0:\"b\"\n"]));

        let outcome = consume_stream(body, StreamParser::new(WireFormat::LinePrefixed), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(outcome.text, "a");
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_flushed() {
        let body = stream::iter(chunks(&["0:\"one \"\n0:\"two\""]));

        let outcome = consume_stream(body, StreamParser::new(WireFormat::LinePrefixed), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(outcome.text, "one two");
        assert!(!outcome.terminated);
    }

    struct Recorder {
        errors: Vec<StreamError>,
    }

    impl StreamObserver for Recorder {
        fn on_update(&mut self, _accumulated: &str) {}

        fn on_error(&mut self, error: &StreamError) {
            self.errors.push(error.clone());
        }
    }

    #[tokio::test]
    async fn test_transport_error_reaches_observer_then_caller() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"0:\"partial\"\n")),
            Err(StreamError::Transport("connection reset".to_string())),
        ]);
        let mut recorder = Recorder { errors: Vec::new() };

        let result = consume_stream(body, StreamParser::new(WireFormat::LinePrefixed), &mut recorder).await;

        assert_eq!(result, Err(StreamError::Transport("connection reset".to_string())));
        assert_eq!(recorder.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_frame() {
        let body = stream::iter(chunks(&["0:\"x\"\n3:\"quota exceeded\"\n"]));
        let mut recorder = Recorder { errors: Vec::new() };

        let result = consume_stream(body, StreamParser::new(WireFormat::LinePrefixed), &mut recorder).await;

        assert_eq!(result, Err(StreamError::Remote("quota exceeded".to_string())));
        assert_eq!(recorder.errors, vec![StreamError::Remote("quota exceeded".to_string())]);
    }

    #[tokio::test]
    async fn test_cancelled_body_reports_cancellation() {
        let (body, handle) = cancellable(stream::pending::<Result<Bytes, StreamError>>());
        handle.cancel();
        assert!(handle.is_cancelled());

        let mut recorder = Recorder { errors: Vec::new() };
        let result = consume_stream(body, StreamParser::new(WireFormat::LinePrefixed), &mut recorder).await;

        assert_eq!(result, Err(StreamError::Cancelled));
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn test_handle_cancelled_before_body_is_attached() {
        let (handle, registration) = CancelHandle::new_pair();
        handle.cancel();

        let body = registration.wrap(stream::iter(chunks(&["0:\"too late\"\n"])));
        let mut updates = Vec::new();
        let mut observer = observe_fn(|text: &str| updates.push(text.to_string()));
        let result = consume_stream(body, StreamParser::new(WireFormat::LinePrefixed), &mut observer).await;

        assert_eq!(result, Err(StreamError::Cancelled));
        assert!(updates.is_empty());
    }
}
