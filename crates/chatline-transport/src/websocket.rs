//! WebSocket realtime transport using `tokio-tungstenite`.

use std::sync::Arc;

use chatline_protocol::{Codec, FrameHeader, JsonCodec, RosterFrame, UserId};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::cookie::CookieStore;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;

use crate::{
    ChannelAuth, ChannelEvent, ChannelHandle, ChannelId, CookieJar, EventSink,
    OpenOptions, RealtimeTransport, TransportError, Url,
};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`RealtimeTransport`] that opens one WebSocket per channel.
///
/// The target URL may use `http(s)` or `ws(s)`; HTTP schemes are mapped to
/// their WebSocket counterparts. The user id is sent as the `userId` query
/// parameter.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    cookies: Option<Arc<CookieJar>>,
    codec: JsonCodec,
}

impl WebSocketTransport {
    /// Creates a transport that never sends cookies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that attaches cookies from `jar` when a channel
    /// is opened with `with_credentials`.
    pub fn with_cookies(jar: Arc<CookieJar>) -> Self {
        Self {
            cookies: Some(jar),
            codec: JsonCodec,
        }
    }
}

impl RealtimeTransport for WebSocketTransport {
    type Handle = WebSocketChannel;

    async fn open(
        &self,
        target: &Url,
        auth: &ChannelAuth,
        options: &OpenOptions,
        events: EventSink,
    ) -> Result<WebSocketChannel, TransportError> {
        let url = realtime_url(target, &auth.user_id)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if options.with_credentials {
            // Cookies are scoped to the HTTP origin, so look them up with
            // the HTTP target rather than the ws:// URL.
            let cookie = self.cookies.as_ref().and_then(|jar| jar.cookies(target));
            if let Some(cookie) = cookie {
                match HeaderValue::from_bytes(cookie.as_bytes()) {
                    Ok(value) => {
                        request.headers_mut().insert(COOKIE, value);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping unusable cookie header");
                    }
                }
            }
        }

        let handshake = tokio_tungstenite::connect_async(request);
        let (ws, _response) = tokio::time::timeout(options.connect_timeout, handshake)
            .await
            .map_err(|_| TransportError::Timeout(options.connect_timeout))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let id = events.channel_id();
        tracing::debug!(%id, user_id = %auth.user_id, "WebSocket handshake complete");
        events.emit(ChannelEvent::Opened);

        let (sink, stream) = ws.split();
        let reader = tokio::spawn(read_frames(
            stream,
            events,
            options.roster_event.clone(),
            self.codec,
        ));

        Ok(WebSocketChannel {
            id,
            sink: Mutex::new(sink),
            reader,
        })
    }
}

/// One open WebSocket channel.
///
/// Dropping it stops the reader task; [`close`](ChannelHandle::close)
/// additionally sends a close frame.
pub struct WebSocketChannel {
    id: ChannelId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    reader: JoinHandle<()>,
}

impl ChannelHandle for WebSocketChannel {
    async fn close(&self) -> Result<(), TransportError> {
        let result = self.sink.lock().await.close().await;
        self.reader.abort();
        result.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ChannelId {
        self.id
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Builds the connection URL: WebSocket scheme plus `?userId=<id>`.
fn realtime_url(target: &Url, user_id: &UserId) -> Result<Url, TransportError> {
    let mut url = target.clone();
    let scheme = match target.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported realtime scheme {other:?}"
            )));
        }
    };
    url.set_scheme(scheme).map_err(|()| {
        TransportError::InvalidUrl(format!("cannot use scheme {scheme} for {target}"))
    })?;
    url.query_pairs_mut().append_pair("userId", user_id.as_str());
    Ok(url)
}

/// Reader loop: turns incoming frames into [`ChannelEvent`]s until the
/// connection ends, then reports `Closed` exactly once.
async fn read_frames(
    mut stream: SplitStream<WsStream>,
    events: EventSink,
    roster_event: String,
    codec: JsonCodec,
) {
    let id = events.channel_id();
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                dispatch_frame(text.as_str().as_bytes(), &roster_event, &codec, &events);
            }
            Some(Ok(Message::Binary(data))) => {
                dispatch_frame(&data, &roster_event, &codec, &events);
            }
            Some(Ok(Message::Close(frame))) => {
                break frame.map(|f| f.reason.as_str().to_string());
            }
            Some(Ok(_)) => continue, // ping/pong/raw frame
            Some(Err(e)) => break Some(e.to_string()),
            None => break None,
        }
    };

    tracing::debug!(%id, ?reason, "WebSocket reader finished");
    events.emit(ChannelEvent::Closed { reason });
}

fn dispatch_frame(
    data: &[u8],
    roster_event: &str,
    codec: &JsonCodec,
    events: &EventSink,
) {
    let header: FrameHeader = match codec.decode(data) {
        Ok(header) => header,
        Err(e) => {
            tracing::debug!(id = %events.channel_id(), error = %e, "skipping malformed frame");
            return;
        }
    };
    if header.event != roster_event {
        tracing::trace!(event = %header.event, "ignoring realtime event");
        return;
    }
    match codec.decode::<RosterFrame>(data) {
        Ok(frame) => {
            events.emit(ChannelEvent::RosterUpdated(frame.data));
        }
        Err(e) => {
            tracing::warn!(id = %events.channel_id(), error = %e, "malformed roster frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_url_maps_https_to_wss() {
        let target = Url::parse("https://chat.example.com/ws").unwrap();
        let url = realtime_url(&target, &UserId::new("U1")).unwrap();
        assert_eq!(url.as_str(), "wss://chat.example.com/ws?userId=U1");
    }

    #[test]
    fn test_realtime_url_maps_http_to_ws() {
        let target = Url::parse("http://127.0.0.1:9000/ws").unwrap();
        let url = realtime_url(&target, &UserId::new("a b")).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9000/ws?userId=a+b");
    }

    #[test]
    fn test_realtime_url_rejects_unknown_scheme() {
        let target = Url::parse("ftp://example.com/").unwrap();
        let result = realtime_url(&target, &UserId::new("U1"));
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_dispatch_frame_emits_roster() {
        let (tx, mut rx) = crate::event_queue();
        let sink = EventSink::new(ChannelId::new(1), tx);
        let raw = br#"{"event":"getOnlineUsers","data":["U3"]}"#;

        dispatch_frame(raw, "getOnlineUsers", &JsonCodec, &sink);

        let tagged = rx.try_recv().expect("roster event");
        assert_eq!(
            tagged.event,
            ChannelEvent::RosterUpdated(vec![UserId::new("U3")])
        );
    }

    #[test]
    fn test_dispatch_frame_ignores_other_events_and_garbage() {
        let (tx, mut rx) = crate::event_queue();
        let sink = EventSink::new(ChannelId::new(1), tx);

        dispatch_frame(br#"{"event":"newMessage","data":{}}"#, "getOnlineUsers", &JsonCodec, &sink);
        dispatch_frame(b"not json", "getOnlineUsers", &JsonCodec, &sink);
        dispatch_frame(br#"{"event":"getOnlineUsers","data":42}"#, "getOnlineUsers", &JsonCodec, &sink);

        assert!(rx.try_recv().is_err(), "nothing should be emitted");
    }
}
