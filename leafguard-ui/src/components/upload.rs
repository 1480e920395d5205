//! Upload Panel
//!
//! Drop zone, browse button, preview and the analyze button.

use leptos::*;
use wasm_bindgen::JsCast;
use web_sys::{DragEvent, FileList, HtmlInputElement};

use super::loading::InlineLoading;
use crate::state::PageState;

/// Pick the single file of a drop or browse. Several files reject the lot.
fn single_file(files: Option<FileList>) -> Option<web_sys::File> {
    let files = files?;
    if files.length() != 1 {
        return None;
    }
    files.get(0)
}

/// Upload panel component
#[component]
pub fn UploadPanel() -> impl IntoView {
    let state = use_context::<PageState>().expect("PageState not found");
    let (dragging, set_dragging) = create_signal(false);

    let on_drop = move |ev: DragEvent| {
        ev.prevent_default();
        set_dragging.set(false);
        if let Some(file) = single_file(ev.data_transfer().and_then(|dt| dt.files())) {
            state.submit_selection(file);
        }
    };

    let on_browse = move |ev: web_sys::Event| {
        let Some(input) = ev
            .target()
            .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };
        if let Some(file) = single_file(input.files()) {
            state.submit_selection(file);
        }
        // Allow picking the same file again
        input.set_value("");
    };

    view! {
        <section class="bg-gray-800 rounded-xl p-6 space-y-4">
            <div
                class=move || format!(
                    "border-2 border-dashed rounded-lg p-6 text-center transition-colors {}",
                    if dragging.get() { "border-green-400 bg-gray-700" } else { "border-gray-600" }
                )
                on:dragover=move |ev: DragEvent| {
                    ev.prevent_default();
                    set_dragging.set(true);
                }
                on:dragleave=move |_| set_dragging.set(false)
                on:drop=on_drop
            >
                {move || state.preview.with(|preview| match preview {
                    Some(preview) => view! {
                        <img src=preview.src() alt="Leaf preview" class="mx-auto max-h-64 rounded-lg" />
                    }.into_view(),
                    None => view! {
                        <div class="space-y-2">
                            <p class="font-medium">"Drag files to upload"</p>
                            <p class="text-gray-400">"Or"</p>
                        </div>
                    }.into_view(),
                })}

                <label class="inline-block mt-4 px-4 py-2 bg-gray-600 hover:bg-gray-500 rounded-lg cursor-pointer">
                    "Browse Files"
                    <input
                        type="file"
                        accept=".png,.jpg,.jpeg"
                        class="hidden"
                        on:change=on_browse
                    />
                </label>
                <p class="text-sm text-gray-400 mt-2">"Formats accepted are .png, .jpg and .jpeg"</p>
            </div>

            {move || state.file.with(|file| file.as_ref().map(|file| {
                let name = file.name();
                view! { <p class="text-sm text-gray-300">{name}</p> }
            }))}

            <button
                on:click=move |_| state.analyze()
                disabled=move || !state.can_analyze()
                class="w-full bg-green-600 hover:bg-green-700 disabled:bg-gray-600
                       disabled:cursor-not-allowed rounded-lg py-3 font-semibold
                       transition-colors flex items-center justify-center space-x-2"
            >
                {move || if state.analyzing.get() {
                    view! {
                        <InlineLoading />
                        <span>"Analyzing..."</span>
                    }.into_view()
                } else {
                    view! { <span>"Analyze"</span> }.into_view()
                }}
            </button>

            {move || state.error.get().map(|message| view! {
                <p class="text-red-400 text-sm">{message}</p>
            })}
        </section>
    }
}
