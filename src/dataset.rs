use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

use crate::gateway::Record;
use crate::model::{Axes, SensorReading};

/// Display cap per device view.
pub const MAX_CHART_POINTS: usize = 1000;

const MIN_CHART_WIDTH: u32 = 800;
const MAX_CHART_WIDTH: u32 = 3000;
const PX_PER_POINT: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeSpan {
    Min5,
    Min15,
    Hour1,
    Hour6,
    Day1,
    Day5,
    Day7,
}

impl RelativeSpan {
    pub const ALL: [RelativeSpan; 7] = [
        RelativeSpan::Min5,
        RelativeSpan::Min15,
        RelativeSpan::Hour1,
        RelativeSpan::Hour6,
        RelativeSpan::Day1,
        RelativeSpan::Day5,
        RelativeSpan::Day7,
    ];

    pub fn minutes(&self) -> i64 {
        match self {
            RelativeSpan::Min5 => 5,
            RelativeSpan::Min15 => 15,
            RelativeSpan::Hour1 => 60,
            RelativeSpan::Hour6 => 360,
            RelativeSpan::Day1 => 1440,
            RelativeSpan::Day5 => 7200,
            RelativeSpan::Day7 => 10080,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelativeSpan::Min5 => "5m",
            RelativeSpan::Min15 => "15m",
            RelativeSpan::Hour1 => "1h",
            RelativeSpan::Hour6 => "6h",
            RelativeSpan::Day1 => "24h",
            RelativeSpan::Day5 => "5d",
            RelativeSpan::Day7 => "7d",
        }
    }
}

/// Active chart window: a named relative span or an explicit calendar
/// range. Exactly one is active at a time; selecting one replaces the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Relative(RelativeSpan),
    Range { from: NaiveDate, to: NaiveDate },
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Relative(RelativeSpan::Day5)
    }
}

impl TimeWindow {
    pub fn label(&self) -> String {
        match self {
            TimeWindow::Relative(span) => span.label().to_owned(),
            TimeWindow::Range { from, to } => {
                format!("{}_{}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d"))
            }
        }
    }

    /// Seconds belong in the tick labels only for minute-granularity spans.
    pub fn with_seconds(&self) -> bool {
        matches!(self, TimeWindow::Relative(span) if span.minutes() < 60)
    }

    fn contains(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            TimeWindow::Relative(span) => ts >= now - Duration::minutes(span.minutes()),
            TimeWindow::Range { from, to } => {
                let from_ts: DateTime<Utc> = from
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    .and_local_timezone(Local)
                    .unwrap()
                    .with_timezone(&Utc);
                let to_ts: DateTime<Utc> = to
                    .and_hms_milli_opt(23, 59, 59, 999)
                    .unwrap()
                    .and_local_timezone(Local)
                    .unwrap()
                    .with_timezone(&Utc);
                ts >= from_ts && ts <= to_ts
            }
        }
    }
}

/// Rendering selected by the user. Lines/area/bars split into
/// accelerometer and gyroscope sub-charts; radar/radial are one combined
/// view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Lines,
    Area,
    Bars,
    Radar,
    Radial,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::Lines,
        ChartKind::Area,
        ChartKind::Bars,
        ChartKind::Radar,
        ChartKind::Radial,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Lines => "Líneas",
            ChartKind::Area => "Área",
            ChartKind::Bars => "Barras",
            ChartKind::Radar => "Radar",
            ChartKind::Radial => "Radial",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            ChartKind::Lines => "lineas",
            ChartKind::Area => "area",
            ChartKind::Bars => "barras",
            ChartKind::Radar => "radar",
            ChartKind::Radial => "radial",
        }
    }

    pub fn combined(&self) -> bool {
        matches!(self, ChartKind::Radar | ChartKind::Radial)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub ts: DateTime<Utc>,
    pub label: String,
    pub accel: Axes,    // avg, m/s²
    pub gyro: Axes,     // avg, rad/s
    pub accel_mag: f64, // m/s²
    pub gyro_mag: f64,  // rad/s
}

/// Absolute per-axis values of the latest point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarSnapshot {
    pub accel: Axes,
    pub gyro: Axes,
}

/// The two magnitude scalars of the latest point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialSnapshot {
    pub accel_mag: f64,
    pub gyro_mag: f64,
}

pub fn filter_window(
    readings: Vec<SensorReading>,
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> Vec<SensorReading> {
    readings
        .into_iter()
        .filter(|r| window.contains(r.ts, now))
        .collect()
}

pub fn time_label(ts: DateTime<Utc>, window: &TimeWindow) -> String {
    let local: DateTime<Local> = ts.into();
    if window.with_seconds() {
        local.format("%H:%M:%S").to_string()
    } else {
        match window {
            TimeWindow::Relative(span) if span.minutes() <= 1440 => {
                local.format("%H:%M").to_string()
            }
            _ => local.format("%d/%m %H:%M").to_string(),
        }
    }
}

/// Window filter, stable chronological sort, display cap and per-point
/// derivation in one pass over already-validated readings.
pub fn to_points(
    readings: Vec<SensorReading>,
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> Vec<ChartPoint> {
    let mut readings = filter_window(readings, window, now);
    readings.sort_by_key(|r| r.ts);
    if readings.len() > MAX_CHART_POINTS {
        readings.drain(..readings.len() - MAX_CHART_POINTS);
    }
    readings
        .iter()
        .map(|r| ChartPoint {
            ts: r.ts,
            label: time_label(r.ts, window),
            accel: r.avg.accel,
            gyro: r.avg.gyro,
            accel_mag: r.avg.accel.magnitude(),
            gyro_mag: r.avg.gyro.magnitude(),
        })
        .collect()
}

/// Full pipeline from raw records: malformed readings are silently
/// excluded, never an error.
pub fn build_dataset(
    records: &[Record],
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> Vec<ChartPoint> {
    let readings = records
        .iter()
        .filter_map(SensorReading::from_record)
        .collect();
    to_points(readings, window, now)
}

pub fn radar_snapshot(points: &[ChartPoint]) -> Option<RadarSnapshot> {
    points.last().map(|p| RadarSnapshot {
        accel: p.accel.abs(),
        gyro: p.gyro.abs(),
    })
}

pub fn radial_snapshot(points: &[ChartPoint]) -> Option<RadialSnapshot> {
    points.last().map(|p| RadialSnapshot {
        accel_mag: p.accel_mag,
        gyro_mag: p.gyro_mag,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSizing {
    pub width: u32,
    /// Anything wider than the base width needs horizontal scroll.
    pub scrollable: bool,
}

pub fn chart_sizing(point_count: usize) -> ChartSizing {
    let width = (point_count as u32)
        .saturating_mul(PX_PER_POINT)
        .clamp(MIN_CHART_WIDTH, MAX_CHART_WIDTH);
    ChartSizing {
        width,
        scrollable: width > MIN_CHART_WIDTH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MotionAverage, MotionSample};
    use chrono::TimeZone;
    use serde_json::json;

    fn reading(id: &str, ts: DateTime<Utc>) -> SensorReading {
        let axes = Axes { x: 3.0, y: 4.0, z: 0.0 };
        SensorReading {
            id: id.to_owned(),
            ts,
            last: MotionSample {
                accel: axes,
                gyro: axes,
                device_ts: None,
            },
            avg: MotionAverage {
                accel: axes,
                gyro: Axes { x: 0.0, y: -0.3, z: 0.4 },
            },
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[test]
    fn relative_window_keeps_only_recent_readings() {
        let t = now();
        let readings = vec![
            reading("a", t - Duration::minutes(10)),
            reading("b", t - Duration::minutes(2)),
            reading("c", t - Duration::minutes(40)),
        ];
        let kept = filter_window(readings, &TimeWindow::Relative(RelativeSpan::Min5), t);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "b");
    }

    #[test]
    fn explicit_range_is_inclusive_to_the_last_millisecond() {
        let to = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let window = TimeWindow::Range {
            from: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            to,
        };
        let last_ms = to
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap()
            .with_timezone(&Utc);
        let next_day = (to + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap()
            .with_timezone(&Utc);

        let kept = filter_window(
            vec![reading("in", last_ms), reading("out", next_day)],
            &window,
            now(),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "in");
    }

    #[test]
    fn points_are_sorted_ascending_and_ties_stay_stable() {
        let t = now();
        let mut tie1 = reading("tie1", t - Duration::seconds(60));
        tie1.avg.accel.x = 1.0;
        let mut tie2 = reading("tie2", t - Duration::seconds(60));
        tie2.avg.accel.x = 2.0;
        let readings = vec![
            reading("late", t - Duration::seconds(10)),
            tie1,
            tie2,
            reading("early", t - Duration::seconds(120)),
        ];
        let points = to_points(readings, &TimeWindow::Relative(RelativeSpan::Min5), t);
        let ts: Vec<_> = points.iter().map(|p| p.ts).collect();
        let mut sorted = ts.clone();
        sorted.sort();
        assert_eq!(ts, sorted);
        // stable: tie1 came before tie2 in the input and keeps that order
        assert_eq!(points[1].ts, points[2].ts);
        assert_eq!(points[1].accel.x, 1.0);
        assert_eq!(points[2].accel.x, 2.0);
    }

    #[test]
    fn display_cap_keeps_the_newest_points() {
        let t = now();
        let readings: Vec<_> = (0..(MAX_CHART_POINTS + 5))
            .map(|i| reading(&format!("r{i}"), t - Duration::seconds(i as i64)))
            .collect();
        let points = to_points(readings, &TimeWindow::Relative(RelativeSpan::Day7), t);
        assert_eq!(points.len(), MAX_CHART_POINTS);
        // the newest reading (offset 0) survives the cap
        assert_eq!(points.last().unwrap().ts, t);
    }

    #[test]
    fn magnitudes_come_from_the_averaged_axes() {
        let t = now();
        let points = to_points(
            vec![reading("r", t)],
            &TimeWindow::Relative(RelativeSpan::Hour1),
            t,
        );
        assert_eq!(points[0].accel_mag, 5.0);
        assert!((points[0].gyro_mag - 0.5).abs() < 1e-12);
    }

    #[test]
    fn malformed_records_are_excluded_without_panicking() {
        let good = json!({
            "id": "ok",
            "created": 0,
            "updated": 0,
            "fields": {
                "ts": 1_700_000_000_000i64 - 1000,
                "last": {
                    "accel": { "x": 0.0, "y": 0.0, "z": 9.8 },
                    "gyro": { "x": 0.0, "y": 0.0, "z": 0.0 }
                },
                "avg": {
                    "accel": { "x": 3.0, "y": 4.0, "z": 0.0 },
                    "gyro": { "x": 0.0, "y": 0.0, "z": 0.0 }
                }
            }
        });
        let missing_avg = json!({
            "id": "mal",
            "created": 0,
            "updated": 0,
            "fields": {
                "ts": 1_700_000_000_000i64 - 1000,
                "last": {
                    "accel": { "x": 0.0, "y": 0.0, "z": 9.8 },
                    "gyro": { "x": 0.0, "y": 0.0, "z": 0.0 }
                }
            }
        });
        let records: Vec<Record> = vec![
            serde_json::from_value(good).unwrap(),
            serde_json::from_value(missing_avg).unwrap(),
        ];
        let points = build_dataset(&records, &TimeWindow::Relative(RelativeSpan::Hour1), now());
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn seconds_only_on_minute_granularity_windows() {
        let t = now();
        let fine = time_label(t, &TimeWindow::Relative(RelativeSpan::Min15));
        let coarse = time_label(t, &TimeWindow::Relative(RelativeSpan::Day1));
        assert_eq!(fine.matches(':').count(), 2, "{fine}");
        assert_eq!(coarse.matches(':').count(), 1, "{coarse}");
    }

    #[test]
    fn snapshots_use_the_latest_point() {
        let t = now();
        let mut early = reading("a", t - Duration::minutes(1));
        early.avg.accel = Axes { x: 1.0, y: 0.0, z: 0.0 };
        let late = reading("b", t);
        let points = to_points(
            vec![early, late],
            &TimeWindow::Relative(RelativeSpan::Hour1),
            t,
        );

        let radar = radar_snapshot(&points).unwrap();
        assert_eq!(radar.gyro, Axes { x: 0.0, y: 0.3, z: 0.4 });

        let radial = radial_snapshot(&points).unwrap();
        assert_eq!(radial.accel_mag, 5.0);

        assert!(radar_snapshot(&[]).is_none());
        assert!(radial_snapshot(&[]).is_none());
    }

    #[test]
    fn chart_width_is_monotonic_and_clamped() {
        assert_eq!(chart_sizing(0).width, 800);
        assert!(!chart_sizing(0).scrollable);
        assert_eq!(chart_sizing(10).width, 800);
        let mid = chart_sizing(100);
        assert_eq!(mid.width, 1500);
        assert!(mid.scrollable);
        assert_eq!(chart_sizing(1000).width, 3000);
    }

    #[test]
    fn default_window_is_five_days_relative() {
        assert_eq!(TimeWindow::default(), TimeWindow::Relative(RelativeSpan::Day5));
    }

    #[test]
    fn window_labels_are_stable() {
        assert_eq!(TimeWindow::Relative(RelativeSpan::Day1).label(), "24h");
        let range = TimeWindow::Range {
            from: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        };
        assert_eq!(range.label(), "2024-01-10_2024-01-15");
    }
}
