use chrono::{Duration, Local};
use wasm_bindgen::JsCast;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::dataset::{ChartKind, RelativeSpan, TimeWindow};
use crate::utils;

#[derive(Properties, PartialEq)]
pub struct Props {
    pub window: TimeWindow,
    pub kind: ChartKind,
    pub on_window_changed: Callback<TimeWindow>,
    pub on_kind_changed: Callback<ChartKind>,
}

/// Window and rendering selection. The window is a single value, so
/// picking a relative span replaces any explicit range and vice versa.
#[function_component(ChartMenu)]
pub fn chart_menu(props: &Props) -> Html {
    let spans: Html = RelativeSpan::ALL
        .iter()
        .map(|span| {
            let span = *span;
            let active = props.window == TimeWindow::Relative(span);
            let cb = props.on_window_changed.clone();
            let onclick = Callback::from(move |_: MouseEvent| {
                cb.emit(TimeWindow::Relative(span));
            });
            html! {
                <button class={classes!("btn", "btn-xs", active.then_some("active"))} {onclick}>
                    {span.label()}
                </button>
            }
        })
        .collect();

    let kinds: Html = ChartKind::ALL
        .iter()
        .map(|kind| {
            let kind = *kind;
            let active = props.kind == kind;
            let cb = props.on_kind_changed.clone();
            let onclick = Callback::from(move |_: MouseEvent| cb.emit(kind));
            html! {
                <button class={classes!("btn", "btn-xs", active.then_some("active"))} {onclick}>
                    {kind.label()}
                </button>
            }
        })
        .collect();

    // date inputs keep showing something sensible while a relative span is
    // active
    let (from, to) = match props.window {
        TimeWindow::Range { from, to } => (from, to),
        TimeWindow::Relative(_) => {
            let today = Local::now().date_naive();
            (today - Duration::days(5), today)
        }
    };

    let on_from = {
        let cb = props.on_window_changed.clone();
        Callback::from(move |e: Event| {
            let input = e
                .target()
                .and_then(|t| t.dyn_into::<HtmlInputElement>().ok());
            if let Some(date) = input.and_then(|i| utils::date_from_input(&i.value())) {
                cb.emit(TimeWindow::Range { from: date, to });
            }
        })
    };

    let on_to = {
        let cb = props.on_window_changed.clone();
        Callback::from(move |e: Event| {
            let input = e
                .target()
                .and_then(|t| t.dyn_into::<HtmlInputElement>().ok());
            if let Some(date) = input.and_then(|i| utils::date_from_input(&i.value())) {
                cb.emit(TimeWindow::Range { from, to: date });
            }
        })
    };

    html! {
        <div class="chart-menu">
            <div class="btn-group" role="group">
                {spans}
            </div>
            <div class="input-group">
                <span class="input-group-addon width-70">{"Desde"}</span>
                <input type="date" class="form-control" onchange={on_from}
                    value={from.format("%Y-%m-%d").to_string()} />
            </div>
            <div class="input-group">
                <span class="input-group-addon width-70">{"Hasta"}</span>
                <input type="date" class="form-control" onchange={on_to}
                    value={to.format("%Y-%m-%d").to_string()} />
            </div>
            <div class="btn-group" role="group">
                {kinds}
            </div>
        </div>
    }
}
