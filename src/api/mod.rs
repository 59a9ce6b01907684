//! Application-facing API description.
//!
//! - [`Routine`] names the trigger/success events of one topic or channel.
//! - [`Codec`] decodes subscription bodies ([`JsonCodec`], [`TextCodec`], [`FnCodec`]).
//! - [`ApiDefinition`] groups [`SubscriptionSpec`] and [`PublishSpec`] entries.

mod codec;
mod definition;
mod routine;

pub(crate) use codec::ErasedCodec;
pub use codec::{Codec, FnCodec, JsonCodec, Message, TextCodec};
pub use definition::{ApiDefinition, PublishSpec, SubscriptionSpec};
pub use routine::Routine;
