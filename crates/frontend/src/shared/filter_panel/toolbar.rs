use super::share::{copy_text, download_json};
use super::use_filter_context;
use leptos::ev;
use leptos::prelude::*;
use wasm_bindgen::JsCast;

/// Undo/redo, reset, the active filter summary and share/export actions.
///
/// Ctrl+Z undoes, Ctrl+Shift+Z and Ctrl+Y redo, unless focus is in a text field.
#[component]
pub fn FilterToolbar() -> impl IntoView {
    let ctx = use_filter_context();
    let notice = RwSignal::new(None::<String>);
    let import_text = RwSignal::new(String::new());

    let description = move || {
        ctx.state.track();
        ctx.manager().filter_description()
    };

    let undo = move || {
        ctx.manager().undo();
    };
    let redo = move || {
        ctx.manager().redo();
    };

    let keys = window_event_listener(ev::keydown, move |ev| {
        if !(ev.ctrl_key() || ev.meta_key()) {
            return;
        }
        let in_text_field = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok())
            .map(|el| matches!(el.tag_name().as_str(), "INPUT" | "TEXTAREA"))
            .unwrap_or(false);
        if in_text_field {
            return;
        }
        match ev.key().to_lowercase().as_str() {
            "z" if ev.shift_key() => {
                ev.prevent_default();
                redo();
            }
            "z" => {
                ev.prevent_default();
                undo();
            }
            "y" => {
                ev.prevent_default();
                redo();
            }
            _ => {}
        }
    });
    on_cleanup(move || keys.remove());

    let reset = move |_| {
        if let Err(e) = ctx.manager().reset(None) {
            log::warn!("reset not applied: {}", e);
        }
    };

    let copy_link = move |_| {
        let url = ctx.manager().export_as_url();
        copy_text(&url, move |copied| {
            notice.set(Some(if copied {
                "Link copied".to_string()
            } else {
                "Could not copy link".to_string()
            }));
        });
    };

    let export = move |_| match ctx.manager().export_state() {
        Ok(json) => {
            if let Err(e) = download_json(&json, "meal-filters.json") {
                log::error!("export download failed: {}", e);
                ctx.last_error.set(Some(e));
            }
        }
        Err(e) => ctx.last_error.set(Some(e.to_string())),
    };

    // accepts an exported JSON document or a shared link
    let import = move |_| {
        let raw = import_text.get_untracked();
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }
        ctx.clear_error();
        let manager = ctx.manager();
        let result = if raw.starts_with('{') {
            manager.import_state(raw)
        } else {
            manager.import_from_url(raw)
        };
        if result.is_ok() {
            import_text.set(String::new());
            notice.set(Some("Filters imported".to_string()));
        }
    };

    view! {
        <div class="filter-toolbar">
            <div class="filter-toolbar__actions">
                <button
                    type="button"
                    class="button button--secondary"
                    title="Undo (Ctrl+Z)"
                    prop:disabled=move || !ctx.history.get().can_undo
                    on:click=move |_| undo()
                >
                    "Undo"
                </button>
                <button
                    type="button"
                    class="button button--secondary"
                    title="Redo (Ctrl+Shift+Z)"
                    prop:disabled=move || !ctx.history.get().can_redo
                    on:click=move |_| redo()
                >
                    "Redo"
                </button>
                <button
                    type="button"
                    class="button button--secondary"
                    prop:disabled=move || !ctx.state.with(|s| ctx.manager().schema().has_active_filters(s))
                    on:click=reset
                >
                    "Reset"
                </button>
                <button type="button" class="button button--secondary" on:click=copy_link>
                    "Copy link"
                </button>
                <button type="button" class="button button--secondary" on:click=export>
                    "Export"
                </button>
            </div>

            <div class="filter-toolbar__summary" aria-live="polite">{description}</div>

            <div class="filter-toolbar__import">
                <textarea
                    rows="2"
                    placeholder="Paste an exported filter file or a shared link"
                    prop:value=move || import_text.get()
                    on:input=move |ev| import_text.set(event_target_value(&ev))
                ></textarea>
                <button type="button" class="button button--primary" on:click=import>
                    "Import"
                </button>
            </div>

            {move || notice.get().map(|msg| view! { <div class="filter-toolbar__notice">{msg}</div> })}
            {move || {
                ctx.last_error
                    .get()
                    .map(|msg| {
                        view! {
                            <div class="filter-toolbar__error" role="alert">
                                {msg}
                                <button type="button" class="filter-toolbar__dismiss" on:click=move |_| ctx.clear_error()>
                                    "×"
                                </button>
                            </div>
                        }
                    })
            }}
        </div>
    }
}
