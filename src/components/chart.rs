use plotly::common::{Fill, Mode, Title};
use plotly::layout::{Axis, Margin};
use plotly::{Bar, Configuration, Layout, Plot, Scatter, ScatterPolar};
use yew::prelude::*;

use crate::dataset::{
    build_dataset, chart_sizing, radar_snapshot, radial_snapshot, ChartKind, ChartPoint,
    TimeWindow, MAX_CHART_POINTS,
};
use crate::gateway::{filter, limit, order_by, Direction, FilterOp};
use crate::hooks::use_collection;
use crate::model::{Axes, COL_READINGS};
use crate::{export, utils};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelSeries {
    Accel,
    Gyro,
    Combined,
}

fn base_layout() -> Layout {
    Layout::default()
        .auto_size(true)
        .hover_mode(plotly::layout::HoverMode::XUnified)
        .margin(Margin::default().top(20).bottom(40).left(50).right(20))
}

fn base_config() -> Configuration {
    Configuration::default()
        .display_logo(false)
        .editable(false)
        .display_mode_bar(plotly::configuration::DisplayModeBar::Hover)
}

fn split_plot(
    points: &[ChartPoint],
    kind: ChartKind,
    unit: &str,
    axes_of: fn(&ChartPoint) -> Axes,
    mag_of: fn(&ChartPoint) -> f64,
) -> Plot {
    let labels: Vec<String> = points.iter().map(|p| p.label.clone()).collect();
    let xs: Vec<f64> = points.iter().map(|p| axes_of(p).x).collect();
    let ys: Vec<f64> = points.iter().map(|p| axes_of(p).y).collect();
    let zs: Vec<f64> = points.iter().map(|p| axes_of(p).z).collect();
    let mags: Vec<f64> = points.iter().map(mag_of).collect();

    let mut plot = Plot::new();
    if kind == ChartKind::Bars {
        plot.add_trace(Bar::new(labels.clone(), xs).name("x"));
        plot.add_trace(Bar::new(labels.clone(), ys).name("y"));
        plot.add_trace(Bar::new(labels, zs).name("z"));
    } else {
        let trace = |values: Vec<f64>, name: &str| {
            let t = Scatter::new(labels.clone(), values)
                .mode(Mode::Lines)
                .name(name);
            if kind == ChartKind::Area {
                t.fill(Fill::ToZeroY)
            } else {
                t
            }
        };
        plot.add_trace(trace(xs, "x"));
        plot.add_trace(trace(ys, "y"));
        plot.add_trace(trace(zs, "z"));
        plot.add_trace(trace(mags, "magnitud"));
    }
    plot.set_layout(base_layout().y_axis(Axis::new().title(Title::new(unit))));
    plot.set_configuration(base_config());
    plot
}

fn combined_plot(points: &[ChartPoint], kind: ChartKind) -> Plot {
    let mut plot = Plot::new();
    if kind == ChartKind::Radar {
        if let Some(snap) = radar_snapshot(points) {
            let theta = vec!["x".to_owned(), "y".to_owned(), "z".to_owned()];
            plot.add_trace(
                ScatterPolar::new(theta.clone(), vec![snap.accel.x, snap.accel.y, snap.accel.z])
                    .name("Aceleración (m/s²)")
                    .fill(Fill::ToSelf),
            );
            plot.add_trace(
                ScatterPolar::new(theta, vec![snap.gyro.x, snap.gyro.y, snap.gyro.z])
                    .name("Giro (rad/s)")
                    .fill(Fill::ToSelf),
            );
        }
    } else if let Some(snap) = radial_snapshot(points) {
        plot.add_trace(
            Bar::new(
                vec!["Aceleración (m/s²)".to_owned(), "Giro (rad/s)".to_owned()],
                vec![snap.accel_mag, snap.gyro_mag],
            )
            .name("magnitud"),
        );
    }
    plot.set_layout(base_layout());
    plot.set_configuration(base_config());
    plot
}

fn build_plot(points: &[ChartPoint], kind: ChartKind, series: PanelSeries) -> Plot {
    match series {
        PanelSeries::Combined => combined_plot(points, kind),
        PanelSeries::Accel => split_plot(points, kind, "m/s²", |p| p.accel, |p| p.accel_mag),
        PanelSeries::Gyro => split_plot(points, kind, "rad/s", |p| p.gyro, |p| p.gyro_mag),
    }
}

#[derive(Properties, PartialEq)]
struct PanelProps {
    id: String,
    title: String,
    points: Vec<ChartPoint>,
    kind: ChartKind,
    series: PanelSeries,
    width: u32,
    scrollable: bool,
}

#[function_component(PlotPanel)]
fn plot_panel(props: &PanelProps) -> Html {
    let p = yew_hooks::use_async::<_, _, ()>({
        let id = props.id.clone();
        let plot = build_plot(&props.points, props.kind, props.series);
        async move {
            plotly::bindings::new_plot(&id, &plot).await;
            Ok(())
        }
    });

    {
        let p = p.clone();
        use_effect_with(
            (props.id.clone(), props.points.clone(), props.kind, props.series),
            move |_| {
                p.run();
                || ()
            },
        );
    }

    html! {
        <div class="panel panel-default">
            <div class="panel-heading">
                <h3 class="panel-title">{props.title.clone()}</h3>
            </div>
            <div class="panel-body">
                <div id={format!("{}-wrap", props.id)}
                    class={classes!("chart-scroll", props.scrollable.then_some("scrollable"))}>
                    <div class="chart" id={props.id.clone()}
                        style={format!("width:{}px", props.width)}></div>
                </div>
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct Props {
    pub device_id: String,
    pub window: TimeWindow,
    pub kind: ChartKind,
    /// Enables the PNG export toolbar.
    #[prop_or_default]
    pub exportable: bool,
}

/// The chart pipeline view: cached readings query, transformation, one of
/// the five renderings, optional image export.
#[function_component(MotionChart)]
pub fn motion_chart(props: &Props) -> Html {
    let handle = use_collection(
        COL_READINGS,
        vec![
            filter("device", FilterOp::Eq, props.device_id.as_str()),
            order_by("ts", Direction::Desc),
            limit(MAX_CHART_POINTS as u32),
        ],
    );

    let dismissed = use_state_eq(|| false);
    {
        let dismissed = dismissed.clone();
        use_effect_with(handle.state.error.clone(), move |_| {
            dismissed.set(false);
            || ()
        });
    }

    let records = handle.state.data.clone().unwrap_or_default();
    let points = build_dataset(&records, &props.window, utils::utc_now());
    let sizing = chart_sizing(points.len());
    let has_points = !points.is_empty();

    let primary_id = if props.kind.combined() {
        format!("chart-{}-combo", props.device_id)
    } else {
        format!("chart-{}-acel", props.device_id)
    };

    let on_export = {
        let scope = props.device_id.clone();
        let kind = props.kind;
        let label = props.window.label();
        let width = sizing.width;
        let graph_id = primary_id.clone();
        Callback::from(move |_: MouseEvent| {
            let filename = export::export_filename(&scope, kind, &label, utils::utc_now());
            let graph_id = graph_id.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let container_id = format!("{graph_id}-wrap");
                if let Err(err) =
                    export::export_chart(&container_id, &graph_id, &filename, width).await
                {
                    log::error!("exportación fallida: {err:?}");
                }
            });
        })
    };

    let error_html = match handle.state.error.as_ref() {
        Some(error) if !*dismissed => {
            let close = {
                let dismissed = dismissed.clone();
                Callback::from(move |_: MouseEvent| dismissed.set(true))
            };
            let retry = handle.refetch.reform(|_: MouseEvent| ());
            html! {
                <div class="alert alert-danger alert-dismissible">
                    <button type="button" class="close" onclick={close}>{"×"}</button>
                    {error.clone()}
                    <button class="btn btn-link" onclick={retry}>{"Reintentar"}</button>
                </div>
            }
        }
        _ => html! {},
    };

    let body = if points.is_empty() {
        if handle.state.loading {
            html! { <div class="chart"><label>{"Cargando…"}</label></div> }
        } else {
            html! { <div class="chart"><label>{"Sin datos"}</label></div> }
        }
    } else if props.kind.combined() {
        let title = match props.kind {
            ChartKind::Radar => "Radar (valor absoluto por eje)",
            _ => "Radial (magnitudes)",
        };
        html! {
            <PlotPanel id={primary_id.clone()} title={title.to_owned()}
                points={points.clone()} kind={props.kind} series={PanelSeries::Combined}
                width={800} scrollable={false} />
        }
    } else {
        html! {
            <>
                <PlotPanel id={primary_id.clone()} title={"Acelerómetro (m/s²)".to_owned()}
                    points={points.clone()} kind={props.kind} series={PanelSeries::Accel}
                    width={sizing.width} scrollable={sizing.scrollable} />
                <PlotPanel id={format!("chart-{}-giro", props.device_id)}
                    title={"Giroscopio (rad/s)".to_owned()}
                    points={points} kind={props.kind} series={PanelSeries::Gyro}
                    width={sizing.width} scrollable={sizing.scrollable} />
            </>
        }
    };

    html! {
        <div class="chart-area">
            {error_html}
            if props.exportable && has_points {
                <div class="chart-toolbar">
                    <button class="btn btn-default" onclick={on_export}>{"Exportar PNG"}</button>
                </div>
            }
            {body}
        </div>
    }
}
