use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use dioxus::prelude::*;
use shared_types::{CorrelationId, InboundChatMessage, ServerEvent};

use crate::channel::{ChannelError, ChannelHandle, Subscription};
use crate::session::SessionIdentity;

pub const GREETING: &str = "Hello! I'm your Creative Wand.";
pub const CHAT_TITLE: &str = "Chat";
pub const CHAT_SUBTITLE: &str = "Talk to your Creative Wand here!";

/// Display surface the presenter drives.
pub trait ChatSurface {
    fn append_response(&mut self, text: &str);
    fn set_visible(&mut self, visible: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAuthor {
    Assistant,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub author: LineAuthor,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatTranscript {
    pub lines: Vec<ChatLine>,
    pub visible: bool,
}

impl ChatTranscript {
    pub fn push(&mut self, author: LineAuthor, text: &str) {
        self.lines.push(ChatLine {
            author,
            text: text.to_string(),
            timestamp: Utc::now(),
        });
    }
}

impl ChatSurface for ChatTranscript {
    fn append_response(&mut self, text: &str) {
        self.push(LineAuthor::Assistant, text);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

impl ChatSurface for Signal<ChatTranscript> {
    fn append_response(&mut self, text: &str) {
        self.write().append_response(text);
    }

    fn set_visible(&mut self, visible: bool) {
        self.write().set_visible(visible);
    }
}

/// Only messages addressed to `me` may reach the display.
pub fn is_addressed_to(message: &InboundChatMessage, me: &CorrelationId) -> bool {
    &message.id == me
}

/// Connects one participant's chat surface to the shared channel.
pub struct ChatPresenter {
    identity: SessionIdentity,
    channel: ChannelHandle,
    subscription: Option<Subscription>,
    greeted: bool,
}

impl ChatPresenter {
    pub fn new(identity: SessionIdentity, channel: ChannelHandle) -> Self {
        Self {
            identity,
            channel,
            subscription: None,
            greeted: false,
        }
    }

    /// Greet and show the surface once, then listen for this participant's
    /// messages. Calling again while active changes nothing.
    pub fn activate<S>(&mut self, mut surface: S)
    where
        S: ChatSurface + 'static,
    {
        if !self.greeted {
            surface.append_response(GREETING);
            surface.set_visible(true);
            self.greeted = true;
        }

        if self.subscription.is_some() {
            return;
        }

        let me = self.identity.correlation_id.clone();
        self.subscription = Some(self.channel.subscribe(move |event| {
            let ServerEvent::Message(message) = event else {
                return;
            };
            if is_addressed_to(message, &me) {
                surface.append_response(&message.message);
            } else {
                dioxus_logger::tracing::debug!("Ignoring chat message for {}", message.id);
            }
        }));
    }

    /// Stop listening. Safe to call more than once.
    pub fn deactivate(&mut self) {
        self.subscription = None;
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    /// Forward participant input tagged with the session code and id. No
    /// acknowledgement is awaited.
    pub fn submit(&self, text: &str) -> Result<(), ChannelError> {
        self.channel.send_chat(
            text,
            &self.identity.session_code,
            &self.identity.correlation_id,
        )
    }
}

#[component]
pub fn ChatPanel(identity: SessionIdentity, channel: ChannelHandle) -> Element {
    let mut transcript = use_signal(ChatTranscript::default);
    let mut input_text = use_signal(String::new);

    let presenter =
        use_hook(|| Rc::new(RefCell::new(ChatPresenter::new(identity.clone(), channel.clone()))));

    // Runs after the first render; the greeting flag keeps it to one line.
    let presenter_activate = presenter.clone();
    use_effect(move || presenter_activate.borrow_mut().activate(transcript));

    let presenter_drop = presenter.clone();
    use_drop(move || presenter_drop.borrow_mut().deactivate());

    let presenter_send = presenter.clone();
    let send_message = use_callback(move |_| {
        let text = input_text.to_string();
        if text.trim().is_empty() {
            return;
        }

        transcript.write().push(LineAuthor::User, &text);
        input_text.set(String::new());

        if let Err(e) = presenter_send.borrow().submit(&text) {
            dioxus_logger::tracing::warn!("Failed to send chat message: {}", e);
        }
    });

    let visible = transcript.read().visible;
    let lines = transcript.read().lines.clone();

    rsx! {
        div {
            style: "position: fixed; right: 1rem; bottom: 1rem; width: 22rem; display: flex; flex-direction: column; align-items: flex-end; gap: 0.5rem;",
            if visible {
                div {
                    style: "width: 100%; height: 28rem; display: flex; flex-direction: column; background: #1f2937; border-radius: 0.75rem; overflow: hidden;",
                    div {
                        style: "padding: 0.75rem 1rem; background: #35cce6; color: #111827;",
                        div { style: "font-weight: 700;", "{CHAT_TITLE}" }
                        div { style: "font-size: 0.85rem;", "{CHAT_SUBTITLE}" }
                    }
                    div {
                        style: "flex: 1; overflow-y: auto; padding: 0.75rem; display: flex; flex-direction: column; gap: 0.5rem;",
                        for (i, line) in lines.into_iter().enumerate() {
                            ChatBubble { key: "{i}", line }
                        }
                    }
                    div {
                        style: "display: flex; gap: 0.5rem; padding: 0.5rem; border-top: 1px solid #374151;",
                        input {
                            style: "flex: 1; padding: 0.5rem; border-radius: 0.5rem; border: none;",
                            placeholder: "Type a message...",
                            value: "{input_text}",
                            oninput: move |e| input_text.set(e.value()),
                            onkeydown: move |e| {
                                if e.key() == Key::Enter {
                                    send_message.call(());
                                }
                            },
                        }
                        button {
                            style: "padding: 0.5rem 0.75rem; border-radius: 0.5rem; border: none; cursor: pointer;",
                            onclick: move |_| send_message.call(()),
                            "Send"
                        }
                    }
                }
            }
            button {
                style: "width: 3.5rem; height: 3.5rem; border-radius: 50%; border: none; background: #35cce6; cursor: pointer;",
                onclick: move |_| {
                    let next = !transcript.read().visible;
                    transcript.write().set_visible(next);
                },
                if visible { "×" } else { "💬" }
            }
        }
    }
}

#[component]
fn ChatBubble(line: ChatLine) -> Element {
    let (align, background) = match line.author {
        LineAuthor::Assistant => ("flex-start", "#374151"),
        LineAuthor::User => ("flex-end", "#2563eb"),
    };
    let time = line.timestamp.format("%H:%M").to_string();

    rsx! {
        div {
            style: "align-self: {align}; max-width: 80%; padding: 0.5rem 0.75rem; border-radius: 0.75rem; background: {background};",
            div { "{line.text}" }
            div { style: "font-size: 0.7rem; opacity: 0.6; text-align: right;", "{time}" }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::recording_channel;
    use shared_types::{EVENT_CHAT_MESSAGE, EVENT_KILL_SESSION, EVENT_MESSAGE};

    /// Surface that shares its transcript with the test body.
    #[derive(Clone, Default)]
    struct SharedSurface(Rc<RefCell<ChatTranscript>>);

    impl ChatSurface for SharedSurface {
        fn append_response(&mut self, text: &str) {
            self.0.borrow_mut().append_response(text);
        }

        fn set_visible(&mut self, visible: bool) {
            self.0.borrow_mut().set_visible(visible);
        }
    }

    impl SharedSurface {
        fn texts(&self) -> Vec<String> {
            self.0.borrow().lines.iter().map(|l| l.text.clone()).collect()
        }
    }

    fn identity(id: &str) -> SessionIdentity {
        SessionIdentity {
            correlation_id: CorrelationId::from(id),
            session_code: "CODE1".to_string(),
            participant_id: "P-42".to_string(),
        }
    }

    fn message_frame(id: &str, text: &str) -> String {
        serde_json::json!({"event": EVENT_MESSAGE, "data": {"id": id, "message": text}}).to_string()
    }

    #[test]
    fn new_presenter_is_inert_until_activated() {
        let (channel, _) = recording_channel();
        let presenter = ChatPresenter::new(identity("my-uuid"), channel.clone());

        channel.deliver(&message_frame("my-uuid", "early"));

        assert!(!presenter.is_listening());
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn activation_greets_once_and_shows_surface() {
        let (channel, _) = recording_channel();
        let surface = SharedSurface::default();
        let mut presenter = ChatPresenter::new(identity("my-uuid"), channel.clone());

        presenter.activate(surface.clone());
        presenter.activate(surface.clone());

        assert_eq!(surface.texts(), vec![GREETING]);
        assert!(surface.0.borrow().visible);
        assert_eq!(channel.listener_count(), 1);
    }

    #[test]
    fn message_for_another_participant_is_not_displayed() {
        let (channel, _) = recording_channel();
        let surface = SharedSurface::default();
        let mut presenter = ChatPresenter::new(identity("my-uuid"), channel.clone());
        presenter.activate(surface.clone());

        channel.deliver(&message_frame("other-uuid", "hi"));

        assert_eq!(surface.texts(), vec![GREETING]);
    }

    #[test]
    fn message_for_this_participant_is_displayed_once() {
        let (channel, _) = recording_channel();
        let surface = SharedSurface::default();
        let mut presenter = ChatPresenter::new(identity("my-uuid"), channel.clone());
        presenter.activate(surface.clone());

        channel.deliver(&message_frame("my-uuid", "hi"));

        assert_eq!(surface.texts(), vec![GREETING, "hi"]);
        assert_eq!(
            surface.0.borrow().lines[1].author,
            LineAuthor::Assistant
        );
    }

    #[test]
    fn non_chat_events_are_ignored() {
        let (channel, _) = recording_channel();
        let surface = SharedSurface::default();
        let mut presenter = ChatPresenter::new(identity("my-uuid"), channel.clone());
        presenter.activate(surface.clone());

        channel.deliver(
            &serde_json::json!({"event": EVENT_KILL_SESSION, "data": {"id": "my-uuid"}}).to_string(),
        );

        assert_eq!(surface.texts(), vec![GREETING]);
    }

    #[test]
    fn deactivate_unregisters_listener() {
        let (channel, _) = recording_channel();
        let surface = SharedSurface::default();
        let mut presenter = ChatPresenter::new(identity("my-uuid"), channel.clone());
        presenter.activate(surface.clone());

        presenter.deactivate();
        presenter.deactivate();
        channel.deliver(&message_frame("my-uuid", "late"));

        assert!(!presenter.is_listening());
        assert_eq!(channel.listener_count(), 0);
        assert_eq!(surface.texts(), vec![GREETING]);
    }

    #[test]
    fn dropping_presenter_unregisters_listener() {
        let (channel, _) = recording_channel();
        let mut presenter = ChatPresenter::new(identity("my-uuid"), channel.clone());
        presenter.activate(SharedSurface::default());

        drop(presenter);

        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn remount_does_not_duplicate_delivery_or_greeting() {
        let (channel, _) = recording_channel();
        let surface = SharedSurface::default();
        let mut presenter = ChatPresenter::new(identity("my-uuid"), channel.clone());

        presenter.activate(surface.clone());
        presenter.deactivate();
        presenter.activate(surface.clone());
        channel.deliver(&message_frame("my-uuid", "hi"));

        assert_eq!(surface.texts(), vec![GREETING, "hi"]);
    }

    #[test]
    fn submit_tags_message_with_code_and_id() {
        let (channel, transport) = recording_channel();
        let presenter = ChatPresenter::new(identity("my-uuid"), channel);

        presenter.submit("make it spooky").unwrap();

        let sent = transport.sent.borrow();
        let frame: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(frame["event"], EVENT_CHAT_MESSAGE);
        assert_eq!(frame["data"]["message"], "make it spooky");
        assert_eq!(frame["data"]["code"], "CODE1");
        assert_eq!(frame["data"]["id"], "my-uuid");
    }

    #[test]
    fn submit_surfaces_disconnected_channel() {
        let (channel, transport) = recording_channel();
        transport.closed.set(true);
        let presenter = ChatPresenter::new(identity("my-uuid"), channel);

        assert!(matches!(
            presenter.submit("hello"),
            Err(ChannelError::NotConnected)
        ));
    }
}
