use std::sync::OnceLock;

/// Port the front-end dev server runs on. The backend always listens on
/// `BACKEND_PORT` of the page's host, dev server or not.
const FRONTEND_DEV_PORT: &str = ":3000";
const BACKEND_PORT: &str = ":8000";

/// Backend origin for a page served from `origin`.
/// - Dev server (`http://host:3000`): `http://host:8000`
/// - Anything else (`https://host`): `https://host:8000`
pub fn derive_api_base(origin: &str) -> String {
    let host = match origin.split_once(FRONTEND_DEV_PORT) {
        Some((host, _)) => host,
        None => origin.trim_end_matches('/'),
    };
    format!("{host}{BACKEND_PORT}")
}

fn get_api_base() -> String {
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_default();
    derive_api_base(&origin)
}

static API_BASE_CACHE: OnceLock<String> = OnceLock::new();

/// Get the cached API base URL
pub fn api_base() -> &'static str {
    API_BASE_CACHE.get_or_init(get_api_base).as_str()
}

pub fn http_to_ws_url(http_url: &str) -> String {
    if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if http_url.is_empty() {
        let protocol = web_sys::window()
            .and_then(|w| w.location().protocol().ok())
            .unwrap_or_else(|| "http:".to_string());
        let host = web_sys::window()
            .and_then(|w| w.location().host().ok())
            .unwrap_or_else(|| "localhost".to_string());

        if protocol == "https:" {
            format!("wss://{host}")
        } else {
            format!("ws://{host}")
        }
    } else {
        format!("ws://{http_url}")
    }
}

pub fn ws_url() -> String {
    format!("{}/ws", http_to_ws_url(api_base()))
}

/// Values the study link carries in its query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    pub code: Option<String>,
    pub participant_id: Option<String>,
    pub mode: Option<String>,
}

impl LaunchParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = value.into();
            if value.trim().is_empty() {
                continue;
            }
            match key.as_ref() {
                "code" => params.code = Some(value),
                "pid" => params.participant_id = Some(value),
                "mode" => params.mode = Some(value),
                _ => {}
            }
        }
        params
    }

    /// Read from `window.location.search`; empty outside a browser.
    pub fn from_location() -> Self {
        let Some(search) = web_sys::window().and_then(|w| w.location().search().ok()) else {
            return Self::default();
        };
        let Ok(query) = web_sys::UrlSearchParams::new_with_str(&search) else {
            return Self::default();
        };

        let pairs = ["code", "pid", "mode"]
            .into_iter()
            .filter_map(|key| query.get(key).map(|value| (key, value)));
        Self::from_pairs(pairs)
    }
}
