use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use daqlink_schema::Measurement;
use daqlink_transport::Endpoint;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MeasurementOutput<'a> {
    index: usize,
    samples: usize,
    min: f32,
    max: f32,
    mean: f32,
    data: &'a [f32],
    timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Summary {
    min: f32,
    max: f32,
    mean: f32,
}

fn summarize(data: &[f32]) -> Summary {
    if data.is_empty() {
        return Summary {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
        };
    }
    let (min, max, sum) = data.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
        |(min, max, sum), v| (min.min(*v), max.max(*v), sum + f64::from(*v)),
    );
    Summary {
        min,
        max,
        mean: (sum / data.len() as f64) as f32,
    }
}

pub fn print_measurement(index: usize, measurement: &Measurement, format: OutputFormat) {
    let summary = summarize(&measurement.data);
    match format {
        OutputFormat::Json => {
            let out = MeasurementOutput {
                index,
                samples: measurement.len(),
                min: summary.min,
                max: summary.max,
                mean: summary.mean,
                data: &measurement.data,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INDEX", "SAMPLES", "MIN", "MAX", "MEAN"])
                .add_row(vec![
                    index.to_string(),
                    measurement.len().to_string(),
                    format!("{:.4}", summary.min),
                    format!("{:.4}", summary.max),
                    format!("{:.4}", summary.mean),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "measurement={} samples={} min={:.4} max={:.4} mean={:.4}",
                index,
                measurement.len(),
                summary.min,
                summary.max,
                summary.mean
            );
        }
        OutputFormat::Raw => {
            let line: Vec<String> = measurement.data.iter().map(|v| v.to_string()).collect();
            println!("{}", line.join(" "));
        }
    }
}

#[derive(Serialize)]
struct ListeningOutput<'a> {
    listening: bool,
    endpoint: String,
    connection: String,
    target: &'a str,
}

pub fn print_listening(endpoint: &Endpoint, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let target = endpoint.target();
            let out = ListeningOutput {
                listening: true,
                endpoint: endpoint.to_string(),
                connection: endpoint.kind().to_string(),
                target: &target,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        _ => println!("listening on {endpoint}"),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
