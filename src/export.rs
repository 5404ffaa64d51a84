use chrono::{DateTime, Utc};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::dataset::ChartKind;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = Plotly, js_name = downloadImage, catch)]
    async fn download_image(div_id: &str, opts: &JsValue) -> Result<JsValue, JsValue>;
}

/// Deterministic artifact name:
/// `sensores-<scope>-<chartKind>-<windowLabel>-<isoTimestampNoColons>.png`.
pub fn export_filename(
    scope: &str,
    kind: ChartKind,
    window_label: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "sensores-{scope}-{}-{window_label}-{}.png",
        kind.slug(),
        at.format("%Y-%m-%dT%H%M%S%.3fZ")
    )
}

/// Rasterizes the chart div to a PNG. The scroll container's
/// overflow/width constraints are relaxed for the capture so a scrolled
/// chart exports at full width, then restored.
pub async fn export_chart(
    container_id: &str,
    graph_id: &str,
    filename: &str,
    width: u32,
) -> Result<(), JsValue> {
    let container = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(container_id))
        .and_then(|e| e.dyn_into::<web_sys::HtmlElement>().ok());

    let restore = container.as_ref().map(|el| {
        let style = el.style();
        let prev = (
            style.get_property_value("overflow").unwrap_or_default(),
            style.get_property_value("width").unwrap_or_default(),
        );
        let _ = style.set_property("overflow", "visible");
        let _ = style.set_property("width", &format!("{width}px"));
        prev
    });

    let opts = js_sys::Object::new();
    js_sys::Reflect::set(&opts, &"format".into(), &"png".into())?;
    js_sys::Reflect::set(
        &opts,
        &"filename".into(),
        &filename.trim_end_matches(".png").into(),
    )?;
    js_sys::Reflect::set(&opts, &"width".into(), &JsValue::from_f64(width as f64))?;
    js_sys::Reflect::set(&opts, &"height".into(), &JsValue::from_f64(420.0))?;

    let result = download_image(graph_id, &opts).await;

    if let (Some(el), Some((overflow, w))) = (container, restore) {
        let style = el.style();
        let _ = style.set_property("overflow", &overflow);
        let _ = style.set_property("width", &w);
    }

    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filename_is_deterministic_and_colon_free() {
        let at = Utc.with_ymd_and_hms(2026, 8, 7, 15, 30, 45).unwrap();
        let name = export_filename("abc123", ChartKind::Lines, "24h", at);
        assert_eq!(name, "sensores-abc123-lineas-24h-2026-08-07T153045.000Z.png");
        assert!(!name.contains(' '));
        assert!(!name.contains(':'));
    }

    #[test]
    fn filename_carries_the_window_label() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let name = export_filename("d9", ChartKind::Radar, "2026-01-01_2026-01-02", at);
        assert!(name.starts_with("sensores-d9-radar-2026-01-01_2026-01-02-"));
        assert!(name.ends_with(".png"));
    }
}
