//! Events a realtime channel reports back to whoever owns it.
//!
//! Transports don't call back into the session layer directly. They push
//! [`ChannelEvent`]s into an unbounded queue, and the owner drains that
//! queue one event at a time. Each event is tagged with the
//! [`ChannelId`] it came from, so the owner can drop events from a channel
//! it has already replaced.

use chatline_protocol::UserId;
use tokio::sync::mpsc;

use crate::ChannelId;

/// Something that happened on a realtime channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The connection is up.
    Opened,

    /// The connection went away (server close, network drop, read error).
    Closed { reason: Option<String> },

    /// The server pushed a complete, new roster of online users.
    RosterUpdated(Vec<UserId>),
}

/// A [`ChannelEvent`] plus the channel it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub channel_id: ChannelId,
    pub event: ChannelEvent,
}

/// Receiving end of the event queue.
pub type EventReceiver = mpsc::UnboundedReceiver<TaggedEvent>;

/// Creates an event queue. The sender is wrapped per channel via
/// [`EventSink::new`].
pub fn event_queue() -> (mpsc::UnboundedSender<TaggedEvent>, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Where a transport reports events for ONE channel.
///
/// Cheap to clone. Emitting never blocks, which matters because the
/// WebSocket reader task emits from inside its read loop.
#[derive(Debug, Clone)]
pub struct EventSink {
    channel_id: ChannelId,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub fn new(
        channel_id: ChannelId,
        tx: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        Self { channel_id, tx }
    }

    /// The channel every event from this sink is tagged with.
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Reports an event. Returns `false` if nobody is listening anymore.
    pub fn emit(&self, event: ChannelEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                channel_id: self.channel_id,
                event,
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_tags_event_with_channel_id() {
        let (tx, mut rx) = event_queue();
        let sink = EventSink::new(ChannelId::new(3), tx);

        assert!(sink.emit(ChannelEvent::Opened));

        let tagged = rx.try_recv().expect("event should be queued");
        assert_eq!(tagged.channel_id, ChannelId::new(3));
        assert_eq!(tagged.event, ChannelEvent::Opened);
    }

    #[test]
    fn test_emit_after_receiver_dropped_returns_false() {
        let (tx, rx) = event_queue();
        let sink = EventSink::new(ChannelId::new(1), tx);
        drop(rx);

        assert!(!sink.emit(ChannelEvent::Closed { reason: None }));
    }
}
