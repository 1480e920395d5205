//! Result Panels
//!
//! The analyze result panel and the field list shared with the live feed and
//! history cards.

use leptos::*;

use crate::model::AnalysisResult;
use crate::state::PageState;

/// Result of the last analyze request
#[component]
pub fn ResultPanel() -> impl IntoView {
    let state = use_context::<PageState>().expect("PageState not found");

    view! {
        <section class="bg-gray-800 rounded-xl p-6">
            <h2 class="text-xl font-semibold mb-4">"Analysis Result"</h2>
            {move || match state.result.get() {
                Some(result) => view! { <ResultFields result=result /> }.into_view(),
                None => view! {
                    <p class="text-gray-400">"Upload an image and click Analyze to see the results"</p>
                }.into_view(),
            }}
        </section>
    }
}

/// Disease name, decision, reason and treatment
#[component]
pub fn ResultFields(result: AnalysisResult) -> impl IntoView {
    view! {
        <dl class="space-y-2">
            <Field label="Disease Name:" value=result.disease_name />
            <Field label="Decision:" value=result.decision />
            <Field label="Reason:" value=result.reason />
            <Field label="Treatment:" value=result.treatment />
        </dl>
    }
}

#[component]
fn Field(label: &'static str, value: String) -> impl IntoView {
    view! {
        <div>
            <dt class="text-sm text-gray-400">{label}</dt>
            <dd class="font-medium">{value}</dd>
        </div>
    }
}
