//! Historical Data Panel

use leptos::*;

use super::result::ResultFields;
use crate::state::PageState;

/// Grid of past analyses, in server order
#[component]
pub fn HistoryPanel() -> impl IntoView {
    let state = use_context::<PageState>().expect("PageState not found");

    view! {
        <section class="bg-gray-800 rounded-xl p-6">
            {move || {
                let entries = state.history.get();
                if entries.is_empty() {
                    view! {
                        <p class="text-gray-400">"No historical data available"</p>
                    }.into_view()
                } else {
                    view! {
                        <div class="grid md:grid-cols-2 lg:grid-cols-3 gap-4">
                            {entries.into_iter().map(|entry| {
                                let src = entry.image_src();
                                view! {
                                    <div class="bg-gray-700 rounded-lg p-4 space-y-3">
                                        {src.map(|src| view! {
                                            <img src=src alt="Analyzed leaf" class="rounded-lg w-full h-40 object-cover" />
                                        })}
                                        <ResultFields result=entry />
                                    </div>
                                }
                            }).collect_view()}
                        </div>
                    }.into_view()
                }
            }}
        </section>
    }
}
