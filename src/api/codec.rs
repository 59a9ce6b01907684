//! # Payload codecs for subscriptions.
//!
//! A [`Codec`] turns the text body of an inbound frame into a typed value.
//! Decoding may be asynchronous. Built-ins:
//! - [`JsonCodec<T>`]: `serde_json::from_str`
//! - [`TextCodec`]: the body as a `String`
//! - [`FnCodec`]: any synchronous closure
//!
//! Inside a [`SubscriptionSpec`](crate::SubscriptionSpec) the codec is erased so
//! that one API definition can mix body types; the decoded value travels in the
//! event as a [`Message<T>`] and is recovered with [`Event::message`](crate::Event::message).

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::DecodeError;
use crate::events::Decoded;
use crate::transport::{Frame, Headers};

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    /// Decoded body.
    pub body: T,
    /// Headers of the original frame.
    pub headers: Headers,
}

/// Decodes a frame body into `Self::Output`.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use stompvisor::{Codec, DecodeError};
///
/// struct Upper;
///
/// #[async_trait]
/// impl Codec for Upper {
///     type Output = String;
///
///     async fn decode(&self, body: &str) -> Result<String, DecodeError> {
///         Ok(body.to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait Codec: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    async fn decode(&self, body: &str) -> Result<Self::Output, DecodeError>;
}

/// JSON body codec.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonCodec<{}>", std::any::type_name::<T>())
    }
}

#[async_trait]
impl<T> Codec for JsonCodec<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Output = T;

    async fn decode(&self, body: &str) -> Result<T, DecodeError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Passes the body through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

#[async_trait]
impl Codec for TextCodec {
    type Output = String;

    async fn decode(&self, body: &str) -> Result<String, DecodeError> {
        Ok(body.to_string())
    }
}

/// Closure-backed codec.
pub struct FnCodec<F, T> {
    f: F,
    _out: PhantomData<fn() -> T>,
}

impl<F, T> FnCodec<F, T>
where
    F: Fn(&str) -> Result<T, DecodeError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _out: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> Codec for FnCodec<F, T>
where
    F: Fn(&str) -> Result<T, DecodeError> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    type Output = T;

    async fn decode(&self, body: &str) -> Result<T, DecodeError> {
        (self.f)(body)
    }
}

/// Object-safe view of a [`Codec`] used by subscription workers.
#[async_trait]
pub(crate) trait ErasedCodec: Send + Sync + 'static {
    async fn decode_frame(&self, frame: Frame) -> Result<Decoded, DecodeError>;
}

#[async_trait]
impl<C: Codec> ErasedCodec for C {
    async fn decode_frame(&self, frame: Frame) -> Result<Decoded, DecodeError> {
        let body = self.decode(&frame.body).await?;
        Ok(Decoded::new(Message {
            body,
            headers: frame.headers,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: i32,
    }

    #[tokio::test]
    async fn test_json_codec_decodes_and_keeps_headers() {
        let frame = Frame::message(r#"{"x":1}"#).with_header("message-id", "m-1");
        let decoded = JsonCodec::<Point>::new().decode_frame(frame).await.unwrap();

        let msg = decoded.downcast_ref::<Point>().unwrap();
        assert_eq!(msg.body, Point { x: 1 });
        assert_eq!(msg.headers.get("message-id").map(String::as_str), Some("m-1"));
    }

    #[tokio::test]
    async fn test_json_codec_rejects_malformed_body() {
        let err = JsonCodec::<Point>::new().decode("{x:").await.unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[tokio::test]
    async fn test_fn_codec() {
        let codec = FnCodec::new(|body: &str| {
            body.parse::<u64>()
                .map_err(|e| DecodeError::Invalid(e.to_string()))
        });
        assert_eq!(codec.decode("17").await.unwrap(), 17);
        assert!(matches!(codec.decode("x").await, Err(DecodeError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_text_codec_passthrough() {
        assert_eq!(TextCodec.decode("raw").await.unwrap(), "raw");
    }
}
