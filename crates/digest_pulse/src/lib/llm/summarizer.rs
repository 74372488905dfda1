use std::{fmt::Display, future::Future};

use bytes::Bytes;
use futures::stream::BoxStream;

/// Raw response body of a streaming summary request.
pub type ByteStream<E> = BoxStream<'static, Result<Bytes, E>>;

pub trait Summarizer {
    const SUMMARIZER_MODEL: &'static str;

    type Error: Display + Send + 'static;

    /// Starts summary generation for `transcript`.
    ///
    /// The returned stream carries newline-delimited JSON records with
    /// incremental text at `choices[0].delta.content` and a final record with
    /// `choices[0].finish_reason == "stop"`.
    fn stream_summary(
        &self,
        transcript: &str,
    ) -> impl Future<Output = Result<ByteStream<Self::Error>, Self::Error>> + Send;
}
