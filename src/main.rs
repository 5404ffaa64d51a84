mod cache;
mod components;
mod dataset;
mod export;
mod gateway;
mod hooks;
mod model;
mod theme;
mod utils;

use std::rc::Rc;

use wasm_bindgen::JsCast;
use web_sys::HtmlSelectElement;
use yew::prelude::*;
use yew_router::prelude::*;

use crate::dataset::{ChartKind, TimeWindow};
use crate::hooks::AppContext;

#[derive(Clone, Routable, PartialEq)]
pub enum Route {
    #[at("/")]
    Overview,
    #[at("/device/:id")]
    Device { id: String },
    #[not_found]
    #[at("/404")]
    NotFound,
}

#[function_component(App)]
fn app() -> Html {
    let ctx = use_memo((), |_| AppContext {
        gateway: Rc::new(gateway::Gateway::from_window()),
        cache: cache::QueryCache::default(),
    });

    // reapply the persisted theme preference on load
    use_effect_with((), |_| {
        theme::apply(theme::load());
        || ()
    });

    html! {
        <ContextProvider<AppContext> context={(*ctx).clone()}>
            <BrowserRouter>
                <Switch<Route> render={switch} />
            </BrowserRouter>
        </ContextProvider<AppContext>>
    }
}

#[derive(Properties, PartialEq)]
pub struct SidebarProps {
    pub current_route: Route,
}

#[function_component(Sidebar)]
pub fn sidebar(props: &SidebarProps) -> Html {
    let class_active = |r: Route| {
        if props.current_route == r {
            "active"
        } else {
            ""
        }
    };

    html! {
        <div class="col-sm-3 col-md-2 sidebar">
            <ul class="nav nav-sidebar">
                <li class={class_active(Route::Overview)}>
                    <Link<Route> to={Route::Overview}>{"⌂ Dispositivos"}</Link<Route>>
                </li>
                <li>
                    <div class="submenuitem">
                        <ThemeSelect />
                    </div>
                </li>
            </ul>

            <ul class="nav nav-sidebar fix-bottom">
            {format!("v{}.{}.{}", env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0), env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0), env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0))}
            </ul>
        </div>
    }
}

#[function_component(ThemeSelect)]
fn theme_select() -> Html {
    let pref = use_state_eq(theme::load);

    let onchange = {
        let pref = pref.clone();
        Callback::from(move |e: Event| {
            let select = e
                .target()
                .and_then(|t| t.dyn_into::<HtmlSelectElement>().ok());
            if let Some(select) = select {
                let next = theme::ThemePref::from_str(&select.value());
                theme::store(next);
                theme::apply(next);
                pref.set(next);
            }
        })
    };

    html! {
        <select class="form-control" {onchange}>
            { for theme::ThemePref::ALL.iter().map(|p| html! {
                <option value={p.as_str()} selected={*pref == *p}>{p.label()}</option>
            }) }
        </select>
    }
}

#[function_component(PageOverview)]
pub fn page_overview() -> Html {
    html! {
        <div class="container-fluid">
            <div class="row">
                <Sidebar current_route={Route::Overview}/>
                <div class="col-sm-9 col-sm-offset-3 col-md-10 col-md-offset-2 main">
                    <h1 class="page-header">{"Dispositivos"}</h1>
                    <components::devices::Devices />
                </div>
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct PageDeviceProps {
    pub id: String,
}

#[function_component(PageDevice)]
pub fn page_device(props: &PageDeviceProps) -> Html {
    let window_handle = use_state_eq(TimeWindow::default);
    let kind_handle = use_state_eq(|| ChartKind::Lines);

    // live document watch: a rename from any session shows up in the title
    let device_doc = hooks::use_watch_document(model::COL_DEVICES, &props.id);
    let title = device_doc
        .data
        .as_ref()
        .and_then(|record| record.as_ref())
        .and_then(model::Device::from_record)
        .map(|device| device.name)
        .unwrap_or_else(|| "Lecturas".to_owned());

    let on_window_changed: Callback<TimeWindow> = {
        let handle = window_handle.clone();
        Callback::from(move |window| handle.set(window))
    };

    let on_kind_changed: Callback<ChartKind> = {
        let handle = kind_handle.clone();
        Callback::from(move |kind| handle.set(kind))
    };

    html! {
        <div class="container-fluid">
            <div class="row">
                <Sidebar current_route={Route::Device { id: props.id.clone() }}/>
                <div class="col-sm-9 col-sm-offset-3 col-md-10 col-md-offset-2 main">
                    <h1 class="page-header">{title}</h1>
                    <components::summary::Summary device_id={props.id.clone()} />
                    <components::chart_menu::ChartMenu
                        window={*window_handle} kind={*kind_handle}
                        {on_window_changed} {on_kind_changed}
                    />
                    <div class="box-center">
                        <components::chart::MotionChart
                            device_id={props.id.clone()}
                            window={*window_handle} kind={*kind_handle}
                            exportable={true}
                        />
                    </div>
                </div>
            </div>
        </div>
    }
}

fn switch(routes: Route) -> Html {
    match routes {
        Route::Overview => html! { <PageOverview/> },
        Route::Device { id } => html! { <PageDevice {id}/> },
        Route::NotFound => html! { <h1>{ "404" }</h1> },
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    yew::Renderer::<App>::new().render();
}
