//! Live Channel
//!
//! Socket.IO client over the browser WebSocket, joined to the default
//! namespace. Reflects connection status and hands pushed `result` events to
//! the page state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

use super::page::PageState;
use crate::model::AnalysisResult;

const RECONNECT_DELAY_MS: u32 = 1000;
const RECONNECT_DELAY_MAX_MS: u32 = 5000;

/// Text frames this client understands
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Engine.IO handshake
    Open,
    /// Engine.IO close
    Close,
    /// Engine.IO ping, with optional probe data
    Ping(String),
    /// Namespace joined
    Joined,
    /// Server left the namespace
    Left,
    /// Namespace refused
    Refused(String),
    /// Event on the default namespace
    Event {
        name: String,
        payload: Option<serde_json::Value>,
    },
    Other,
}

/// Decode one text frame
pub fn parse_frame(text: &str) -> Frame {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => Frame::Open,
        Some('1') => Frame::Close,
        Some('2') => Frame::Ping(chars.as_str().to_string()),
        Some('4') => parse_socket_packet(chars.as_str()),
        _ => Frame::Other,
    }
}

fn parse_socket_packet(data: &str) -> Frame {
    let mut chars = data.chars();
    let kind = chars.next();
    let rest = chars.as_str();

    // Other namespaces are prefixed with "/name,"
    if rest.starts_with('/') {
        return Frame::Other;
    }

    match kind {
        Some('0') => Frame::Joined,
        Some('1') => Frame::Left,
        Some('4') => Frame::Refused(rest.to_string()),
        Some('2') => {
            let body = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let Ok(serde_json::Value::Array(items)) = serde_json::from_str(body) else {
                return Frame::Other;
            };
            let mut items = items.into_iter();
            match items.next() {
                Some(serde_json::Value::String(name)) => Frame::Event {
                    name,
                    payload: items.next(),
                },
                _ => Frame::Other,
            }
        }
        _ => Frame::Other,
    }
}

/// Event handlers of the current socket. Replaced on every reconnect.
struct Handlers {
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
    _on_error: Closure<dyn FnMut(JsValue)>,
}

fn detach(ws: &WebSocket) {
    ws.set_onmessage(None);
    ws.set_onclose(None);
    ws.set_onerror(None);
}

/// Live channel client
#[derive(Clone)]
pub struct ChannelClient {
    ws: Rc<RefCell<Option<WebSocket>>>,
    handlers: Rc<RefCell<Option<Handlers>>>,
    url: String,
    reconnect_attempts: Rc<Cell<u32>>,
    closed: Rc<Cell<bool>>,
}

impl ChannelClient {
    pub fn new(url: &str) -> Self {
        Self {
            ws: Rc::new(RefCell::new(None)),
            handlers: Rc::new(RefCell::new(None)),
            url: url.to_string(),
            reconnect_attempts: Rc::new(Cell::new(0)),
            closed: Rc::new(Cell::new(false)),
        }
    }

    /// Connect to the Socket.IO endpoint
    pub fn connect(&self, state: PageState) {
        if self.closed.get() {
            return;
        }

        if let Some(previous) = self.ws.borrow_mut().take() {
            detach(&previous);
        }

        match WebSocket::new(&self.url) {
            Ok(ws) => {
                let handlers = self.setup_handlers(&ws, state);
                *self.handlers.borrow_mut() = Some(handlers);
                *self.ws.borrow_mut() = Some(ws);
            }
            Err(e) => {
                web_sys::console::error_1(&format!("Channel connection failed: {:?}", e).into());
                self.schedule_reconnect(state);
            }
        }
    }

    fn setup_handlers(&self, ws: &WebSocket, state: PageState) -> Handlers {
        // On message
        let client = self.clone();
        let socket = ws.clone();
        let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
            if let Ok(text) = event.data().dyn_into::<js_sys::JsString>() {
                let text: String = text.into();
                client.handle_frame(&text, &socket, state);
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        // On close
        let client = self.clone();
        let on_close = Closure::wrap(Box::new(move |event: CloseEvent| {
            web_sys::console::log_1(
                &format!("Channel closed: code={}, reason={}", event.code(), event.reason()).into(),
            );
            state.connected.set(false);
            client.schedule_reconnect(state);
        }) as Box<dyn FnMut(CloseEvent)>);
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        // On error
        let on_error = Closure::wrap(Box::new(move |e: JsValue| {
            web_sys::console::error_1(&format!("Channel error: {:?}", e).into());
        }) as Box<dyn FnMut(JsValue)>);
        ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        Handlers {
            _on_message: on_message,
            _on_close: on_close,
            _on_error: on_error,
        }
    }

    fn handle_frame(&self, text: &str, socket: &WebSocket, state: PageState) {
        match parse_frame(text) {
            Frame::Open => {
                let _ = socket.send_with_str("40");
            }
            Frame::Ping(data) => {
                let _ = socket.send_with_str(&format!("3{}", data));
            }
            Frame::Joined => {
                web_sys::console::log_1(&"Channel connected".into());
                self.reconnect_attempts.set(0);
                state.connected.set(true);
            }
            Frame::Left => {
                state.connected.set(false);
                self.close();
            }
            Frame::Refused(reason) => {
                web_sys::console::error_1(&format!("Channel refused: {}", reason).into());
                self.close();
            }
            Frame::Close => {
                state.connected.set(false);
            }
            Frame::Event { name, payload } if name == "result" => {
                let parsed = payload.and_then(|p| serde_json::from_value::<AnalysisResult>(p).ok());
                match parsed {
                    Some(result) if result.image_src().is_some() => state.apply_live(result),
                    _ => web_sys::console::warn_1(&"Malformed result event".into()),
                }
            }
            Frame::Event { .. } | Frame::Other => {}
        }
    }

    fn schedule_reconnect(&self, state: PageState) {
        if self.closed.get() {
            return;
        }

        let attempts = self.reconnect_attempts.get();
        let delay = RECONNECT_DELAY_MS
            .saturating_mul(2_u32.saturating_pow(attempts.min(16)))
            .min(RECONNECT_DELAY_MAX_MS);
        self.reconnect_attempts.set(attempts + 1);

        let client = self.clone();
        gloo_timers::callback::Timeout::new(delay, move || {
            web_sys::console::log_1(&format!("Attempting reconnect (attempt {})", attempts + 1).into());
            client.connect(state);
        })
        .forget();
    }

    /// Leave the namespace and close for good
    pub fn close(&self) {
        self.closed.set(true);
        if let Some(ws) = self.ws.borrow_mut().take() {
            detach(&ws);
            if ws.ready_state() == WebSocket::OPEN {
                let _ = ws.send_with_str("41");
            }
            let _ = ws.close();
        }

        // May run inside the message handler, so free the handlers later
        if let Some(handlers) = self.handlers.borrow_mut().take() {
            gloo_timers::callback::Timeout::new(0, move || drop(handlers)).forget();
        }
    }
}

/// Open the live channel (call from app root)
pub fn init_channel(state: PageState, api_base: &str) -> ChannelClient {
    let url = api_base
        .replace("http://", "ws://")
        .replace("https://", "wss://");
    let url = format!("{}/socket.io/?EIO=4&transport=websocket", url);

    let client = ChannelClient::new(&url);
    client.connect(state);
    client
}
