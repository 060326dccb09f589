//! Incremental decoding of chat response bodies.
//!
//! Bytes are buffered into lines ([`LineBuffer`]), each line is decoded by
//! the [`FrameDecoder`] matching the endpoint's [`WireFormat`], and the
//! [`StreamParser`] accumulates text fragments, reporting progress to a
//! [`StreamObserver`].

mod buffering;
mod decoder;
mod frames;
mod parser;

pub use buffering::LineBuffer;
pub use decoder::{EventStreamDecoder, FrameDecoder, LinePrefixedDecoder};
pub use frames::{encode_error, encode_finish, encode_text, Frame, WireFormat};
pub use parser::{
    cancellable, consume_stream, observe_fn, CancelHandle, CancelRegistration, CancellableBody, FnObserver,
    NoopObserver, StreamObserver, StreamOutcome, StreamParser,
};
