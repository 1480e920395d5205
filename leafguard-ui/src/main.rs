//! LeafGuard Page
//!
//! Plant leaf disease detection page built with Leptos (WASM).
//!
//! # Features
//!
//! - Drag-and-drop or browse upload of a single leaf image
//! - Analysis through the REST service
//! - Real-time feed of analyses pushed over Socket.IO
//! - Historical results grid
//!
//! # Architecture
//!
//! This is a client-side rendered (CSR) Leptos application that compiles to
//! WebAssembly. It talks to the analysis service over HTTP and a Socket.IO
//! WebSocket.

use leptos::*;

mod api;
mod app;
mod components;
mod model;
mod state;

fn main() {
    // Set up panic hook for better error messages in WASM
    console_error_panic_hook::set_once();

    mount_to_body(|| view! { <app::App /> });
}
