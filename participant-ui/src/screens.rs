use std::rc::Rc;

use dioxus::prelude::*;

use crate::channel::{ChannelHandle, ChannelStatus, Subscription};
use crate::chat::ChatPanel;
use crate::config::{ws_url, LaunchParams};
use crate::document::{DocumentSnapshot, DocumentView};
use crate::session::{
    secret_code, session_signal, terminate_session, HttpTermination, SessionIdentity,
    SessionSignal, SessionState,
};

#[component]
pub fn App() -> Element {
    let launch = use_hook(LaunchParams::from_location);
    let mut session = use_signal(SessionState::default);
    let mut identity = use_signal(|| None::<SessionIdentity>);

    let start_session = move |(code, participant_id): (String, String)| {
        // One identity per page load; a finished session is not restarted.
        if identity.read().is_some() {
            return;
        }
        let created = SessionIdentity::create(code, participant_id);
        dioxus_logger::tracing::info!("Session started as {}", created.correlation_id);
        session.write().start(&created);
        identity.set(Some(created));
    };

    let end_session = move |_: ()| {
        let Some(current) = identity.read().clone() else {
            return;
        };
        terminate_session(
            &mut session.write(),
            &current.session_code,
            &current.correlation_id,
            &HttpTermination,
        );
    };

    let session_killed = move |_: ()| {
        dioxus_logger::tracing::info!("Session ended by the server");
        session.write().end_locally();
    };

    let state = session.read().clone();
    let current = identity.read().clone();

    rsx! {
        div {
            style: "min-height: 100vh; background-color: #111827; color: white; padding: 1rem;",
            match (state.active, current) {
                (true, Some(current)) => rsx! {
                    SessionScreen {
                        identity: current,
                        on_end: end_session,
                        on_killed: session_killed,
                    }
                },
                _ if state.ended => rsx! {
                    EndScreen { participant_id: state.participant_id.clone() }
                },
                _ => rsx! {
                    Landing { params: launch.clone(), on_start: start_session }
                },
            }
        }
    }
}

#[component]
fn Landing(params: LaunchParams, on_start: EventHandler<(String, String)>) -> Element {
    let mut code = use_signal(|| params.code.clone().unwrap_or_default());
    let mut participant_id = use_signal(|| params.participant_id.clone().unwrap_or_default());
    let mode = params.mode.clone().unwrap_or_else(|| "-".to_string());

    let ready = !code.read().trim().is_empty() && !participant_id.read().trim().is_empty();

    rsx! {
        div {
            style: "margin-bottom: 32px; display: flex; flex-direction: column; gap: 0.75rem; max-width: 32rem;",
            h2 { "Click \"Help\" at any time if you need to check instructions." }
            h2 {
                "In case you accidentally closed the survey window, just reopen it - your progress is automatically saved."
            }
            span { "Mode {mode}" }
            input {
                placeholder: "Session code",
                value: "{code}",
                oninput: move |e| code.set(e.value()),
            }
            input {
                placeholder: "Participant ID",
                value: "{participant_id}",
                oninput: move |e| participant_id.set(e.value()),
            }
            button {
                disabled: !ready,
                onclick: move |_| {
                    on_start.call((code.read().trim().to_string(), participant_id.read().trim().to_string()));
                },
                "Start Session"
            }
        }
    }
}

#[component]
fn SessionScreen(
    identity: SessionIdentity,
    on_end: EventHandler<()>,
    on_killed: EventHandler<()>,
) -> Element {
    let mut status = use_signal(ChannelStatus::default);
    let mut snapshot = use_signal(DocumentSnapshot::default);

    let channel = use_hook(|| {
        match ChannelHandle::connect(&ws_url(), move |next| status.set(next)) {
            Ok(channel) => Some(channel),
            Err(e) => {
                dioxus_logger::tracing::error!("Chat channel unavailable: {}", e);
                status.set(ChannelStatus::Disconnected);
                None
            }
        }
    });

    let me = identity.correlation_id.clone();
    let _session_events = use_hook(|| {
        let subscription: Option<Subscription> = channel.as_ref().map(|channel| {
            channel.subscribe(move |event| match session_signal(event, &me) {
                Some(SessionSignal::Document(update)) => snapshot.set(update.into()),
                Some(SessionSignal::Ended) => on_killed.call(()),
                None => {}
            })
        });
        Rc::new(subscription)
    });

    let status_text = match status() {
        ChannelStatus::Connecting => "Connecting…",
        ChannelStatus::Connected => "Connected",
        ChannelStatus::Disconnected => "Disconnected",
    };

    rsx! {
        div {
            style: "display: flex; flex-direction: column; gap: 1rem;",
            div {
                style: "display: flex; justify-content: space-between; align-items: center;",
                span { style: "font-size: 0.8rem; opacity: 0.7;", "{status_text}" }
                form {
                    onsubmit: move |e| {
                        e.prevent_default();
                        on_end.call(());
                    },
                    button { r#type: "submit", "End Session" }
                }
            }
            DocumentView { snapshot: snapshot() }
            if let Some(channel) = channel.clone() {
                ChatPanel { identity: identity.clone(), channel }
            }
        }
    }
}

#[component]
fn EndScreen(participant_id: String) -> Element {
    let code = secret_code(&participant_id);

    rsx! {
        div {
            h3 { "Thanks for trying out Creative Wand!" }
            "Your participant ID is: {participant_id}"
            br {}
            "Your secret code is: \"{code}\""
        }
    }
}
