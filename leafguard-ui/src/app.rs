//! App Root Component
//!
//! Provides page state, opens the live channel for the lifetime of the page
//! and lays out the panels.

use leptos::*;

use crate::api;
use crate::components::{HistoryPanel, RealtimePanel, ResultPanel, StatusBadge, Tabs, UploadPanel};
use crate::model::ViewMode;
use crate::state::{init_channel, provide_page_state};

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    let state = provide_page_state();

    // Live channel is closed when the page goes away
    let channel = init_channel(state, &api::get_api_base());
    on_cleanup(move || channel.close());

    state.refresh_history();

    view! {
        <div class="min-h-screen bg-gray-900 text-white">
            <main class="container mx-auto px-4 py-8 space-y-8">
                <header class="flex items-center justify-between">
                    <h1 class="text-3xl font-bold">"Plant Leaf Disease Detection"</h1>
                    <StatusBadge />
                </header>

                <div class="grid md:grid-cols-2 gap-6">
                    <UploadPanel />
                    <ResultPanel />
                </div>

                <Tabs />

                {move || match state.view.get() {
                    ViewMode::Realtime => view! { <RealtimePanel /> }.into_view(),
                    ViewMode::History => view! { <HistoryPanel /> }.into_view(),
                }}
            </main>
        </div>
    }
}
