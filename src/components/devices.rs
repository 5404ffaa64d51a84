use std::collections::HashMap;

use yew::prelude::*;
use yew_router::prelude::*;

use crate::cache::collection_key;
use crate::gateway::{filter, limit, order_by, Direction, FilterOp};
use crate::hooks::{use_collection, AppContext};
use crate::model::{Device, DeviceStatus, SensorReading, COL_DEVICES, COL_READINGS};
use crate::{utils, Route};

/// Overview: every device with its derived status and the age of its
/// newest reading.
#[function_component(Devices)]
pub fn device_list() -> Html {
    let ctx = use_context::<AppContext>().expect("AppContext no montado");
    let devices_handle = use_collection(COL_DEVICES, vec![order_by("name", Direction::Asc)]);
    let latest = use_state(|| None::<HashMap<String, Option<SensorReading>>>);

    // one limit-1 readings query per device, through the same cache the
    // hooks use
    {
        let latest = latest.clone();
        use_effect_with(devices_handle.state.data.clone(), move |devices| {
            if let Some(devices) = devices.clone() {
                wasm_bindgen_futures::spawn_local(async move {
                    let mut map = HashMap::new();
                    for record in &devices {
                        let Some(device) = Device::from_record(record) else {
                            continue;
                        };
                        let constraints = vec![
                            filter("device", FilterOp::Eq, device.id.as_str()),
                            order_by("ts", Direction::Desc),
                            limit(1),
                        ];
                        let key = collection_key(COL_READINGS, &constraints);
                        let records = match ctx.cache.get(&key) {
                            Some(records) => records,
                            None => match ctx.gateway.read_many(COL_READINGS, &constraints).await {
                                Ok(records) => {
                                    ctx.cache.put(&key, records.clone());
                                    records
                                }
                                Err(err) => {
                                    log::error!("última lectura de {}: {err}", device.id);
                                    continue;
                                }
                            },
                        };
                        map.insert(
                            device.id.clone(),
                            records.first().and_then(SensorReading::from_record),
                        );
                    }
                    latest.set(Some(map));
                });
            }
            || ()
        });
    }

    if let Some(error) = devices_handle.state.error.as_ref() {
        let retry = devices_handle.refetch.reform(|_: MouseEvent| ());
        return html! {
            <div class="alert alert-danger">
                {error.clone()}
                <button class="btn btn-link" onclick={retry}>{"Reintentar"}</button>
            </div>
        };
    }

    let Some(devices) = devices_handle.state.data.as_ref() else {
        return html! { <div class="chart"><label>{"Cargando…"}</label></div> };
    };

    let now = utils::utc_now();
    let cards: Html = devices
        .iter()
        .filter_map(Device::from_record)
        .map(|device| {
            // until the per-device readings resolve, the stored last-active
            // stamp stands in for the newest reading
            let last_ts = latest
                .as_ref()
                .and_then(|map| map.get(&device.id))
                .and_then(|reading| reading.as_ref())
                .map(|reading| reading.ts)
                .or(device.last_active);
            let status = DeviceStatus::derive(last_ts, now);
            let seen = last_ts
                .map(|ts| utils::hace(now - ts))
                .unwrap_or_else(|| "sin lecturas".to_owned());

            html! {
                <div class="border-rounded card">
                    <div class="card-header">
                        <div class="card-item">{device.name.clone()}</div>
                        <hr/>
                    </div>
                    <div class="card-content">
                        if status == DeviceStatus::Online {
                            <div class="card-item">{status.label()}</div><div>{"🟢"}</div>
                        } else {
                            <div class="card-item">{status.label()}</div><div>{"🔴"}</div>
                        }
                        <div class="card-item">{"Identificador"}</div><div>{device.id.clone()}</div>
                        <div class="card-item">{"Última lectura"}</div><div>{seen}</div>
                    </div>
                    <Link<Route> to={Route::Device { id: device.id.clone() }} classes="btn btn-default">
                        {"Ver lecturas"}
                    </Link<Route>>
                </div>
            }
        })
        .collect();

    html! { <>{cards}</> }
}
