use std::collections::HashSet;

use crate::{Channel, Handle};

/// Insertion-ordered channel set keyed by handle. First observation wins.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    seen: HashSet<Handle>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and keeps the earlier record if the handle is known.
    pub fn record(&mut self, channel: Channel) -> bool {
        if !self.seen.insert(channel.handle.clone()) {
            return false;
        }
        self.channels.push(channel);
        true
    }

    pub fn contains(&self, handle: &Handle) -> bool {
        self.seen.contains(handle)
    }

    pub fn get(&self, handle: &Handle) -> Option<&Channel> {
        self.channels.iter().find(|c| &c.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Channel> {
        self.channels
    }
}

impl Extend<Channel> for ChannelRegistry {
    fn extend<T: IntoIterator<Item = Channel>>(&mut self, iter: T) {
        for channel in iter {
            self.record(channel);
        }
    }
}
