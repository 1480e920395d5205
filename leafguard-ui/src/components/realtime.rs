//! Real-time Feed Panel

use leptos::*;

use super::result::ResultFields;
use crate::state::PageState;

/// Latest analysis pushed over the live channel
#[component]
pub fn RealtimePanel() -> impl IntoView {
    let state = use_context::<PageState>().expect("PageState not found");

    view! {
        <section class="bg-gray-800 rounded-xl p-6">
            <h2 class="text-xl font-semibold mb-4">"Real-time Analysis Feed"</h2>
            {move || match state.live.get() {
                Some(live) => {
                    let src = live.image_src();
                    view! {
                        <div class="grid md:grid-cols-2 gap-6">
                            {src.map(|src| view! {
                                <img src=src alt="Analyzed leaf" class="rounded-lg max-h-64" />
                            })}
                            <div>
                                <ResultFields result=live />
                                {move || state.live_received_at.get().map(|at| view! {
                                    <p class="text-xs text-gray-500 mt-4">{format!("Received {}", at)}</p>
                                })}
                            </div>
                        </div>
                    }.into_view()
                }
                None => view! {
                    <p class="text-gray-400">"Waiting for real-time analysis data..."</p>
                }.into_view(),
            }}
        </section>
    }
}
