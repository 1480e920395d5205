//! View Tabs
//!
//! Switches between the real-time feed and the history grid. Switching only
//! changes what is shown.

use leptos::*;

use crate::model::ViewMode;
use crate::state::PageState;

#[component]
pub fn Tabs() -> impl IntoView {
    view! {
        <div class="flex space-x-2 border-b border-gray-700">
            <TabButton mode=ViewMode::Realtime />
            <TabButton mode=ViewMode::History />
        </div>
    }
}

#[component]
fn TabButton(mode: ViewMode) -> impl IntoView {
    let state = use_context::<PageState>().expect("PageState not found");

    view! {
        <button
            on:click=move |_| state.view.set(mode)
            class=move || format!(
                "px-4 py-2 font-medium transition-colors {}",
                if state.view.get() == mode {
                    "text-green-400 border-b-2 border-green-400"
                } else {
                    "text-gray-400 hover:text-white"
                }
            )
        >
            {mode.label()}
        </button>
    }
}
