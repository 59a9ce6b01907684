//! # API definition: what one connection subscribes to and publishes on.
//!
//! An [`ApiDefinition`] lists subscription entries (topic + routine + codec)
//! and publish entries (channel + routine). Each connection epoch installs one
//! worker per entry.
//!
//! ## Rules
//! - Topic paths must be unique among subscriptions.
//! - Channel paths must be unique among publish entries.
//! - A topic may also appear as a publish channel.
//!
//! ## Example
//! ```
//! use serde::Deserialize;
//! use stompvisor::{ApiDefinition, PublishSpec, Routine, SubscriptionSpec};
//!
//! #[derive(Deserialize)]
//! struct Chat { text: String }
//!
//! let api = ApiDefinition::new()
//!     .subscribe(SubscriptionSpec::json::<Chat>("/topic/chat", Routine::new("chat")))
//!     .publish(PublishSpec::new("/app/send", Routine::new("send")));
//!
//! assert!(api.validate().is_ok());
//! assert_eq!(api.worker_count(), 2);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::codec::{Codec, ErasedCodec, JsonCodec};
use super::routine::Routine;
use crate::error::RuntimeError;

/// One inbound subscription.
#[derive(Clone)]
pub struct SubscriptionSpec {
    topic: Arc<str>,
    routine: Routine,
    codec: Arc<dyn ErasedCodec>,
}

impl SubscriptionSpec {
    /// Subscribes `topic` and decodes bodies with `codec`.
    pub fn new<C: Codec>(topic: impl Into<Arc<str>>, routine: Routine, codec: C) -> Self {
        Self {
            topic: topic.into(),
            routine,
            codec: Arc::new(codec),
        }
    }

    /// Subscribes `topic` and decodes JSON bodies into `T`.
    pub fn json<T>(topic: impl Into<Arc<str>>, routine: Routine) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        Self::new(topic, routine, JsonCodec::<T>::new())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn routine(&self) -> &Routine {
        &self.routine
    }

    pub(crate) fn codec(&self) -> Arc<dyn ErasedCodec> {
        Arc::clone(&self.codec)
    }
}

impl fmt::Debug for SubscriptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSpec")
            .field("topic", &self.topic)
            .field("routine", &self.routine)
            .finish_non_exhaustive()
    }
}

/// One outbound publish channel.
#[derive(Clone, Debug)]
pub struct PublishSpec {
    channel: Arc<str>,
    routine: Routine,
}

impl PublishSpec {
    pub fn new(channel: impl Into<Arc<str>>, routine: Routine) -> Self {
        Self {
            channel: channel.into(),
            routine,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn routine(&self) -> &Routine {
        &self.routine
    }
}

/// Subscriptions and publish channels of one connection.
#[derive(Clone, Debug, Default)]
pub struct ApiDefinition {
    subscriptions: Vec<SubscriptionSpec>,
    publish: Vec<PublishSpec>,
}

impl ApiDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscription entry.
    pub fn subscribe(mut self, spec: SubscriptionSpec) -> Self {
        self.subscriptions.push(spec);
        self
    }

    /// Adds a publish entry.
    pub fn publish(mut self, spec: PublishSpec) -> Self {
        self.publish.push(spec);
        self
    }

    pub fn subscriptions(&self) -> &[SubscriptionSpec] {
        &self.subscriptions
    }

    pub fn publish_definitions(&self) -> &[PublishSpec] {
        &self.publish
    }

    /// Number of routine workers installed per epoch.
    pub fn worker_count(&self) -> usize {
        self.subscriptions.len() + self.publish.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worker_count() == 0
    }

    /// Rejects duplicate topics, duplicate channels, and a routine name used
    /// twice in the same direction.
    ///
    /// A subscription and a publish channel may share a path or a routine name.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        unique(self.subscriptions.iter().map(SubscriptionSpec::topic))?;
        unique(self.subscriptions.iter().map(|s| s.routine().name()))?;
        unique(self.publish.iter().map(PublishSpec::channel))?;
        unique(self.publish.iter().map(|p| p.routine().name()))
    }
}

fn unique<'a>(routes: impl Iterator<Item = &'a str>) -> Result<(), RuntimeError> {
    let mut seen = HashSet::new();
    for route in routes {
        if !seen.insert(route) {
            return Err(RuntimeError::DuplicateRoute {
                route: route.to_string(),
            });
        }
    }
    Ok(())
}
