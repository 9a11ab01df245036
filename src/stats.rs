//! System stats sampler behind `GET /stats`.
//!
//! Independent of the relay core: every connection owns its own `sysinfo`
//! handles and pushes one JSON snapshot per interval until the client leaves.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures_util::stream::{self, Stream};
use serde::Serialize;
use sysinfo::{Components, Disks, System};

const MIB: u64 = 1024 * 1024;

/// Sensor labels that identify the CPU package temperature on common boards.
const CPU_SENSOR_LABELS: [&str; 3] = ["Package id 0", "Tdie", "coretemp"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub cpu_percent: f64,
    pub cpu_cores: usize,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,

    pub mem_used: u64,
    pub mem_total: u64,
    pub mem_percent: f64,

    pub swap_used: u64,
    pub swap_total: u64,
    pub swap_percent: f64,

    pub temp: f64,

    pub disk_used: u64,
    pub disk_total: u64,
    pub disk_percent: f64,
}

pub struct StatsSampler {
    sys: System,
    disks: Disks,
    components: Components,
}

impl Default for StatsSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSampler {
    pub fn new() -> Self {
        // cpu usage is a delta between two refreshes; take the first one now
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        Self {
            sys,
            disks: Disks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
        }
    }

    pub fn sample(&mut self) -> Stats {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        // mounts and sensors can appear at runtime; re-list them every sample
        self.disks = Disks::new_with_refreshed_list();
        self.components = Components::new_with_refreshed_list();

        let load = System::load_average();
        let (disk_used, disk_total) = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .map(|d| (d.total_space().saturating_sub(d.available_space()), d.total_space()))
            .unwrap_or((0, 0));

        let temp = cpu_temp(
            self.components
                .list()
                .iter()
                .map(|c| (c.label(), c.temperature())),
        );

        Stats {
            cpu_percent: self.sys.global_cpu_usage() as f64,
            cpu_cores: self.sys.cpus().len(),
            load1: load.one,
            load5: load.five,
            load15: load.fifteen,
            mem_used: self.sys.used_memory() / MIB,
            mem_total: self.sys.total_memory() / MIB,
            mem_percent: percent(self.sys.used_memory(), self.sys.total_memory()),
            swap_used: self.sys.used_swap() / MIB,
            swap_total: self.sys.total_swap() / MIB,
            swap_percent: percent(self.sys.used_swap(), self.sys.total_swap()),
            temp,
            disk_used: disk_used / MIB,
            disk_total: disk_total / MIB,
            disk_percent: percent(disk_used, disk_total),
        }
    }
}

/// Reading of the first CPU package sensor, in °C; 0 when absent.
fn cpu_temp<'a>(readings: impl IntoIterator<Item = (&'a str, Option<f32>)>) -> f64 {
    readings
        .into_iter()
        .find(|(label, _)| CPU_SENSOR_LABELS.iter().any(|l| label.contains(*l)))
        .and_then(|(_, t)| t)
        .map(f64::from)
        .unwrap_or(0.0)
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

/// Unnamed SSE messages, one snapshot per `every`. The first one is immediate.
pub fn stats_stream(every: Duration) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let ticker = tokio::time::interval(every);
    stream::unfold(
        (StatsSampler::new(), ticker),
        |(mut sampler, mut ticker)| async move {
            ticker.tick().await;
            let snapshot = sampler.sample();
            let ev = match serde_json::to_string(&snapshot) {
                Ok(json) => Event::default().data(json),
                Err(e) => {
                    tracing::warn!(target: "relay::stats", error = %e, "stats encode failed");
                    Event::default().comment("stats unavailable")
                }
            };
            Some((Ok(ev), (sampler, ticker)))
        },
    )
}
