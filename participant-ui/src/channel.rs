//! Shared real-time channel between this participant and the study backend.
//!
//! One [`ChannelHandle`] is opened per session and passed to every component
//! that talks to the backend. Inbound frames are decoded into
//! [`ServerEvent`]s and handed, in arrival order, to every live
//! [`Subscription`]. Dropping a subscription unregisters its listener.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use shared_types::{ClientEvent, CorrelationId, OutboundChatMessage, ServerEvent};
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, ErrorEvent, Event, MessageEvent, WebSocket};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to create WebSocket: {0}")]
    Create(String),

    #[error("Channel is not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

/// Outbound half of the connection.
pub trait Transport {
    fn is_open(&self) -> bool;
    fn send_text(&self, text: &str) -> Result<(), ChannelError>;
}

/// Decode one text frame. Unknown or malformed frames are dropped.
pub fn parse_server_frame(payload: &str) -> Option<ServerEvent> {
    match serde_json::from_str::<ServerEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            dioxus_logger::tracing::debug!("Dropping unrecognised frame ({}): {}", e, payload);
            None
        }
    }
}

type Listener = Rc<RefCell<dyn FnMut(&ServerEvent)>>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

struct ChannelInner {
    transport: RefCell<Option<Box<dyn Transport>>>,
    listeners: RefCell<Listeners>,
    status: Cell<ChannelStatus>,
    on_status: RefCell<Option<Box<dyn FnMut(ChannelStatus)>>>,
}

impl ChannelInner {
    fn new() -> Self {
        Self {
            transport: RefCell::new(None),
            listeners: RefCell::new(Listeners::default()),
            status: Cell::new(ChannelStatus::Connecting),
            on_status: RefCell::new(None),
        }
    }

    fn set_status(&self, status: ChannelStatus) {
        if self.status.replace(status) == status {
            return;
        }
        if let Some(callback) = self.on_status.borrow_mut().as_mut() {
            callback(status);
        }
    }

    fn deliver(&self, payload: &str) {
        let Some(event) = parse_server_frame(payload) else {
            return;
        };

        // Snapshot so listeners may subscribe or unsubscribe while we dispatch.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            match listener.try_borrow_mut() {
                Ok(mut listener) => (&mut *listener)(&event),
                Err(_) => {
                    dioxus_logger::tracing::debug!("Skipping listener already handling an event")
                }
            }
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners
            .borrow_mut()
            .entries
            .retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Owned handle to the session's single connection. Clones share it.
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Rc<ChannelInner>,
}

impl PartialEq for ChannelHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("status", &self.status())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ChannelHandle {
    /// Open the browser WebSocket at `url`.
    pub fn connect<F>(url: &str, on_status: F) -> Result<Self, ChannelError>
    where
        F: FnMut(ChannelStatus) + 'static,
    {
        dioxus_logger::tracing::info!("Connecting to WebSocket: {}", url);

        let inner = Rc::new(ChannelInner::new());
        *inner.on_status.borrow_mut() = Some(Box::new(on_status));

        let transport = WsTransport::open(url, Rc::downgrade(&inner))?;
        *inner.transport.borrow_mut() = Some(Box::new(transport));

        Ok(Self { inner })
    }

    /// Build a channel over an already-open transport.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        let inner = Rc::new(ChannelInner::new());
        inner.status.set(ChannelStatus::Connected);
        *inner.transport.borrow_mut() = Some(transport);
        Self { inner }
    }

    pub fn status(&self) -> ChannelStatus {
        self.inner.status.get()
    }

    /// Register `listener` for every inbound event until the returned
    /// subscription is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&ServerEvent) + 'static,
    {
        let mut listeners = self.inner.listeners.borrow_mut();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners
            .entries
            .push((id, Rc::new(RefCell::new(listener)) as Listener));

        Subscription {
            channel: Rc::downgrade(&self.inner),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().entries.len()
    }

    /// Feed one raw inbound frame through decoding and dispatch.
    pub fn deliver(&self, payload: &str) {
        self.inner.deliver(payload);
    }

    /// Send one frame. Fails with [`ChannelError::NotConnected`] instead of
    /// queueing when the socket is not open; nothing is retried.
    pub fn send(&self, event: &ClientEvent) -> Result<(), ChannelError> {
        let transport = self.inner.transport.borrow();
        let transport = transport
            .as_ref()
            .filter(|t| t.is_open())
            .ok_or(ChannelError::NotConnected)?;

        let frame = serde_json::to_string(event)?;
        transport.send_text(&frame)
    }

    pub fn send_chat(
        &self,
        text: &str,
        code: &str,
        id: &CorrelationId,
    ) -> Result<(), ChannelError> {
        self.send(&ClientEvent::ChatMessage(OutboundChatMessage {
            message: text.to_string(),
            code: code.to_string(),
            id: id.clone(),
        }))
    }
}

/// Live listener registration; unregisters on drop.
#[must_use = "dropping a subscription unregisters its listener"]
pub struct Subscription {
    channel: Weak<ChannelInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.unsubscribe(self.id);
        }
    }
}

struct WsTransport {
    ws: WebSocket,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(ErrorEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl WsTransport {
    fn open(url: &str, channel: Weak<ChannelInner>) -> Result<Self, ChannelError> {
        let ws = WebSocket::new(url).map_err(|e| {
            dioxus_logger::tracing::error!("Failed to create WebSocket: {:?}", e);
            ChannelError::Create(format!("{e:?}"))
        })?;

        let channel_open = channel.clone();
        let on_open = Closure::wrap(Box::new(move |_e: Event| {
            dioxus_logger::tracing::info!("WebSocket connected");
            if let Some(channel) = channel_open.upgrade() {
                channel.set_status(ChannelStatus::Connected);
            }
        }) as Box<dyn FnMut(Event)>);
        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        let channel_message = channel.clone();
        let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
            let Ok(text) = e.data().dyn_into::<js_sys::JsString>() else {
                return;
            };
            let text_str = text.as_string().unwrap_or_default();
            dioxus_logger::tracing::debug!("WebSocket message: {}", text_str);

            if let Some(channel) = channel_message.upgrade() {
                channel.deliver(&text_str);
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let on_error = Closure::wrap(Box::new(move |e: ErrorEvent| {
            dioxus_logger::tracing::error!("WebSocket error: {}", e.message());
        }) as Box<dyn FnMut(ErrorEvent)>);
        ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        let channel_close = channel;
        let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
            dioxus_logger::tracing::info!("WebSocket disconnected");
            if let Some(channel) = channel_close.upgrade() {
                channel.set_status(ChannelStatus::Disconnected);
            }
        }) as Box<dyn FnMut(CloseEvent)>);
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        Ok(Self {
            ws,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
        })
    }
}

impl Transport for WsTransport {
    fn is_open(&self) -> bool {
        self.ws.ready_state() == WebSocket::OPEN
    }

    fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        self.ws
            .send_with_str(text)
            .map_err(|e| ChannelError::Send(format!("{e:?}")))
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
        let _ = self.ws.close();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::recording_channel;
    use super::*;
    use shared_types::{EVENT_CHAT_MESSAGE, EVENT_MESSAGE};

    fn message_frame(id: &str, text: &str) -> String {
        serde_json::json!({"event": EVENT_MESSAGE, "data": {"id": id, "message": text}}).to_string()
    }

    fn collect_events(channel: &ChannelHandle) -> (Subscription, Rc<RefCell<Vec<ServerEvent>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = channel.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        (subscription, seen)
    }

    #[test]
    fn delivers_events_in_arrival_order() {
        let (channel, _) = recording_channel();
        let (_subscription, seen) = collect_events(&channel);

        channel.deliver(&message_frame("u1", "first"));
        channel.deliver(&message_frame("u2", "second"));
        channel.deliver(&message_frame("u1", "third"));

        let texts: Vec<String> = seen
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ServerEvent::Message(msg) => Some(msg.message.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn malformed_and_unknown_frames_are_dropped() {
        let (channel, _) = recording_channel();
        let (_subscription, seen) = collect_events(&channel);

        channel.deliver("not json");
        channel.deliver(r#"{"event":"pong","data":{}}"#);
        channel.deliver(r#"{"event":"message","data":{"message":"no id"}}"#);

        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn dropping_subscription_unregisters_listener() {
        let (channel, _) = recording_channel();
        let (subscription, seen) = collect_events(&channel);
        assert_eq!(channel.listener_count(), 1);

        drop(subscription);
        channel.deliver(&message_frame("u1", "late"));

        assert_eq!(channel.listener_count(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn repeated_mount_cycles_do_not_accumulate_listeners() {
        let (channel, _) = recording_channel();

        for _ in 0..3 {
            let (subscription, _) = collect_events(&channel);
            assert_eq!(channel.listener_count(), 1);
            drop(subscription);
        }

        let (_subscription, seen) = collect_events(&channel);
        channel.deliver(&message_frame("u1", "once"));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn listener_may_drop_its_own_subscription_during_dispatch() {
        let (channel, _) = recording_channel();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let slot_inner = slot.clone();
        let hits_inner = hits.clone();
        let subscription = channel.subscribe(move |_| {
            hits_inner.set(hits_inner.get() + 1);
            slot_inner.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(subscription);

        channel.deliver(&message_frame("u1", "a"));
        channel.deliver(&message_frame("u1", "b"));

        assert_eq!(hits.get(), 1);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn reentrant_delivery_skips_the_busy_listener() {
        let (channel, _) = recording_channel();
        let relay_seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        let relay_channel = channel.clone();
        let relay_sink = relay_seen.clone();
        let _relay = channel.subscribe(move |event| {
            let ServerEvent::Message(message) = event else {
                return;
            };
            relay_sink.borrow_mut().push(message.message.clone());
            if message.message == "outer" {
                relay_channel.deliver(&message_frame("u1", "inner"));
            }
        });
        let (_subscription, seen) = collect_events(&channel);

        channel.deliver(&message_frame("u1", "outer"));

        assert_eq!(*relay_seen.borrow(), vec!["outer"]);
        let texts: Vec<String> = seen
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ServerEvent::Message(message) => Some(message.message.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["inner", "outer"]);
    }

    #[test]
    fn send_chat_writes_chat_message_frame() {
        let (channel, transport) = recording_channel();

        channel
            .send_chat("hello", "CODE1", &CorrelationId::from("u1"))
            .unwrap();

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        let frame: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({
                "event": EVENT_CHAT_MESSAGE,
                "data": {"message": "hello", "code": "CODE1", "id": "u1"}
            })
        );
    }

    #[test]
    fn send_while_disconnected_fails_explicitly() {
        let (channel, transport) = recording_channel();
        transport.closed.set(true);

        let result = channel.send_chat("hello", "CODE1", &CorrelationId::from("u1"));

        assert!(matches!(result, Err(ChannelError::NotConnected)));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn status_changes_notify_once() {
        let (channel, _) = recording_channel();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        *channel.inner.on_status.borrow_mut() =
            Some(Box::new(move |status| sink.borrow_mut().push(status)));

        channel.inner.set_status(ChannelStatus::Connected);
        channel.inner.set_status(ChannelStatus::Disconnected);
        channel.inner.set_status(ChannelStatus::Disconnected);

        assert_eq!(channel.status(), ChannelStatus::Disconnected);
        assert_eq!(*seen.borrow(), vec![ChannelStatus::Disconnected]);
    }
}
