use std::collections::VecDeque;

use reel_core::model::Ad;

/// FIFO of the ads in one response, ordered by `sequence`.
#[derive(Debug, Default)]
pub struct AdPod {
    queue: VecDeque<Ad>,
    is_ad_pod: bool,
}

impl AdPod {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue. Ads without a sequence go after every sequenced ad;
    /// equal keys keep response order.
    pub fn load(&mut self, mut ads: Vec<Ad>) {
        ads.sort_by_key(|ad| (ad.sequence.is_none(), ad.sequence));
        self.is_ad_pod = ads.len() > 1;
        self.queue = ads.into();
    }

    pub fn take_next(&mut self) -> Option<Ad> {
        self.queue.pop_front()
    }

    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the last loaded response held more than one ad.
    pub fn is_ad_pod(&self) -> bool {
        self.is_ad_pod
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.is_ad_pod = false;
    }
}
