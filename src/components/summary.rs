use chrono::{DateTime, Local};
use wasm_bindgen::JsCast;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::gateway::{filter, limit, order_by, Direction, FilterOp};
use crate::hooks::{
    use_document, use_mutation, use_watch_collection, Mutation, MutationResult,
};
use crate::model::{Device, DeviceStatus, SensorReading, COL_DEVICES, COL_READINGS};
use crate::utils;

const NOT_AVAILABLE: &str = "N/D";

#[derive(Properties, PartialEq)]
pub struct Props {
    pub device_id: String,
}

/// Device detail header: document via the cached binding, newest reading
/// via a live limit-1 subscription, rename through the mutation binding.
#[function_component(Summary)]
pub fn summary(props: &Props) -> Html {
    let device_handle = use_document(COL_DEVICES, &props.device_id);
    let live = use_watch_collection(
        COL_READINGS,
        vec![
            filter("device", FilterOp::Eq, props.device_id.as_str()),
            order_by("ts", Direction::Desc),
            limit(1),
        ],
    );

    let refetch_device = device_handle.refetch.clone();
    let mutation = use_mutation(Callback::from(move |result: MutationResult| {
        if result.error.is_none() {
            refetch_device.emit(());
        }
    }));

    let device = device_handle
        .state
        .data
        .as_ref()
        .and_then(|record| record.as_ref())
        .and_then(Device::from_record);

    let reading = live
        .data
        .as_ref()
        .and_then(|records| records.first())
        .and_then(SensorReading::from_record);

    let now = utils::utc_now();
    let status = DeviceStatus::derive(reading.as_ref().map(|r| r.ts), now);
    let seen = reading
        .as_ref()
        .map(|r| utils::hace(now - r.ts))
        .unwrap_or_else(|| NOT_AVAILABLE.to_owned());
    let device_clock = reading
        .as_ref()
        .and_then(|r| r.last.device_ts)
        .map(|ts| DateTime::<Local>::from(ts).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_owned());

    let on_rename = {
        let run = mutation.run.clone();
        let id = props.device_id.clone();
        Callback::from(move |e: Event| {
            let input = e
                .target()
                .and_then(|t| t.dyn_into::<HtmlInputElement>().ok());
            if let Some(input) = input {
                let name = input.value();
                if name.trim().is_empty() {
                    return;
                }
                let mut fields = serde_json::Map::new();
                fields.insert("name".to_owned(), serde_json::Value::String(name));
                run.emit(Mutation::Update {
                    collection: COL_DEVICES.to_owned(),
                    id: id.clone(),
                    fields,
                });
            }
        })
    };

    let axes_row = |label: &str, axes: Option<crate::model::Axes>, unit: &str| {
        let text = axes
            .map(|a| format!("{:.2} / {:.2} / {:.2} {unit}", a.x, a.y, a.z))
            .unwrap_or_else(|| NOT_AVAILABLE.to_owned());
        html! { <tr><td>{label.to_owned()}</td><td>{text}</td></tr> }
    };

    let title = device
        .as_ref()
        .map(|d| d.name.clone())
        .unwrap_or_else(|| format!("{} (sin nombre)", props.device_id));

    html! {
        <div class="panel panel-default">
            <div class="panel-heading">
                <div class="row">
                    <div class="col-lg-8">
                        <h3>{title.clone()}</h3>
                    </div>
                    <div class="col-lg-4">
                        <div class="input-group">
                            <input type="text" class="form-control" placeholder={title}
                                onchange={on_rename} disabled={mutation.running} />
                            <span class="input-group-addon">{"Renombrar"}</span>
                        </div>
                    </div>
                </div>
                if let Some(error) = mutation.error.as_ref() {
                    <div class="alert alert-danger">{error.clone()}</div>
                }
                if let Some(error) = device_handle.state.error.as_ref() {
                    <div class="alert alert-danger">{error.clone()}</div>
                }
            </div>
            <div class="panel-body">
                <table class="table table-hover">
                    <tbody>
                        if status == DeviceStatus::Online {
                            <tr><td>{status.label()}</td><td>{"🟢"}</td></tr>
                        } else {
                            <tr class="warning"><td>{status.label()}</td><td>{"🔴"}</td></tr>
                        }
                        <tr><td>{"Última lectura"}</td><td>{seen}</td></tr>
                        <tr><td>{"Reloj del dispositivo"}</td><td>{device_clock}</td></tr>
                        { axes_row("Aceleración", reading.as_ref().map(|r| r.last.accel), "m/s²") }
                        { axes_row("Giro", reading.as_ref().map(|r| r.last.gyro), "rad/s") }
                    </tbody>
                </table>
            </div>
        </div>
    }
}
