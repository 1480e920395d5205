//! Connection Status Badge

use leptos::*;

use crate::state::PageState;

#[component]
pub fn StatusBadge() -> impl IntoView {
    let state = use_context::<PageState>().expect("PageState not found");

    view! {
        {move || {
            if state.connected.get() {
                view! {
                    <span class="flex items-center space-x-1 text-green-400">
                        <span class="w-2 h-2 bg-green-400 rounded-full pulse" />
                        <span>"Connected"</span>
                    </span>
                }.into_view()
            } else {
                view! {
                    <span class="flex items-center space-x-1 text-red-400">
                        <span class="w-2 h-2 bg-red-400 rounded-full" />
                        <span>"Disconnected"</span>
                    </span>
                }.into_view()
            }
        }}
    }
}
