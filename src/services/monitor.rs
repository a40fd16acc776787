use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sysinfo::{Disks, System};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::{ServiceError, ServiceResult};
use crate::store::{StateManager, StoreCounts};

/// Hard cap on stored metric snapshots, independent of the age limit.
const MAX_METRIC_SNAPSHOTS: usize = 10_080;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Start of a look-back window of `hours`, or `None` when the window is not
/// representable.
pub fn lookback_cutoff(hours: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_hours(hours).and_then(|window| Utc::now().checked_sub_signed(window))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentHealth {
    Healthy,
    Unknown,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub name: String,
    pub status: ComponentHealth,
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
    pub last_check: DateTime<Utc>,
}

/// One captured error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorLogEntry {
    pub id: Uuid,
    /// Error code from the response body, e.g. `validation_error`.
    pub error_type: String,
    pub message: String,
    pub status_code: u16,
    pub method: String,
    pub path: String,
    /// Resource segment of the path (`orders`, `materials`, ...).
    pub component: Option<String>,
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorLogEntry {
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        status_code: u16,
        method: impl Into<String>,
        path: impl Into<String>,
        request_id: Option<String>,
    ) -> Self {
        let path = path.into();
        Self {
            id: Uuid::new_v4(),
            error_type: error_type.into(),
            message: message.into(),
            status_code,
            method: method.into(),
            component: component_for_path(&path),
            path,
            request_id,
            timestamp: Utc::now(),
        }
    }
}

fn component_for_path(path: &str) -> Option<String> {
    let trimmed = path.trim_start_matches('/');
    let rest = trimmed.strip_prefix("api/v1/").unwrap_or(trimmed);
    rest.split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ErrorLogQuery {
    pub error_type: Option<String>,
    pub component: Option<String>,
    pub status_code: Option<u16>,
    pub hours: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimeRange {
    pub oldest: DateTime<Utc>,
    pub newest: DateTime<Utc>,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorSummary {
    pub count: usize,
    pub time_period_hours: Option<i64>,
    pub time_range: Option<TimeRange>,
    pub by_type: BTreeMap<String, usize>,
    pub by_status: BTreeMap<u16, usize>,
    pub by_path: BTreeMap<String, usize>,
    pub by_component: BTreeMap<String, usize>,
    pub recent: Vec<ErrorLogEntry>,
}

/// Point-in-time host resource usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SystemMetrics {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    /// Used memory as a percentage of total.
    pub memory_usage: f64,
    /// Available memory in GB.
    pub available_memory: f64,
    /// Used space on the root filesystem as a percentage of total.
    pub disk_usage: f64,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetricsQuery {
    /// Only include snapshots from the last N hours
    pub hours: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MetricAggregates {
    pub cpu_percent: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsTimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsSummary {
    pub count: usize,
    pub time_period_hours: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<MetricsTimeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub averages: Option<MetricAggregates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximums: Option<MetricAggregates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<SystemMetrics>,
}

/// Static description of the host.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SystemInfo {
    pub platform: Option<String>,
    pub release: Option<String>,
    pub version: Option<String>,
    pub architecture: Option<String>,
    pub hostname: Option<String>,
    pub cpu_count: usize,
    pub physical_cpu_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthReport {
    pub status: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    pub documents: StoreCounts,
    pub components: Vec<ComponentStatus>,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub error_log_capacity: usize,
    pub metrics_max_age_hours: i64,
    /// Run disk and memory checks as part of every health report.
    pub system_checks: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for MonitorSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            error_log_capacity: cfg.error_log_capacity,
            metrics_max_age_hours: cfg.metrics_max_age_hours,
            system_checks: cfg.monitor_system_checks,
        }
    }
}

/// Disk health from the share of free space.
pub fn disk_health(percent_free: f64) -> ComponentHealth {
    if percent_free < 5.0 {
        ComponentHealth::Error
    } else if percent_free < 10.0 {
        ComponentHealth::Warning
    } else {
        ComponentHealth::Healthy
    }
}

/// Memory health from the share of available memory.
pub fn memory_health(percent_available: f64) -> ComponentHealth {
    if percent_available < 5.0 {
        ComponentHealth::Error
    } else if percent_available < 15.0 {
        ComponentHealth::Warning
    } else {
        ComponentHealth::Healthy
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn gigabytes(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GB)
}

#[derive(Debug, Clone, Copy)]
struct DiskSpace {
    total: u64,
    available: u64,
}

#[derive(Debug, Clone, Copy)]
struct MemorySpace {
    total: u64,
    available: u64,
    used: u64,
}

/// Host sampling. The `System` handle is kept between samples so CPU usage is
/// measured over the interval since the previous refresh.
struct HostSampler {
    system: System,
    disks: Disks,
}

impl HostSampler {
    fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self {
            system,
            disks: Disks::new(),
        }
    }

    fn memory(&mut self) -> MemorySpace {
        self.system.refresh_memory();
        MemorySpace {
            total: self.system.total_memory(),
            available: self.system.available_memory(),
            used: self.system.used_memory(),
        }
    }

    /// Root filesystem, or every mounted disk summed when `/` is not listed.
    fn disk(&mut self) -> Option<DiskSpace> {
        self.disks.refresh_list();
        let root = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"));
        match root {
            Some(disk) => Some(DiskSpace {
                total: disk.total_space(),
                available: disk.available_space(),
            }),
            None if self.disks.list().is_empty() => None,
            None => Some(self.disks.list().iter().fold(
                DiskSpace {
                    total: 0,
                    available: 0,
                },
                |acc, d| DiskSpace {
                    total: acc.total.saturating_add(d.total_space()),
                    available: acc.available.saturating_add(d.available_space()),
                },
            )),
        }
    }

    fn sample(&mut self) -> SystemMetrics {
        self.system.refresh_cpu();
        let cpu_percent = round2(f64::from(self.system.global_cpu_info().cpu_usage()));
        let memory = self.memory();
        let disk_usage = self
            .disk()
            .map(|d| percent(d.total.saturating_sub(d.available), d.total))
            .unwrap_or(0.0);
        SystemMetrics {
            timestamp: Utc::now(),
            cpu_percent,
            memory_usage: percent(memory.used, memory.total),
            available_memory: gigabytes(memory.available),
            disk_usage,
        }
    }

    fn info(&mut self) -> SystemInfo {
        self.system.refresh_cpu();
        SystemInfo {
            platform: System::name(),
            release: System::os_version(),
            version: System::kernel_version(),
            architecture: System::cpu_arch(),
            hostname: System::host_name(),
            cpu_count: self.system.cpus().len(),
            physical_cpu_count: self.system.physical_core_count(),
        }
    }
}

/// Component registry, bounded error log and system metric history backing
/// the monitor endpoints.
pub struct MonitorService {
    store: Arc<StateManager>,
    components: DashMap<String, ComponentStatus>,
    errors: RwLock<VecDeque<ErrorLogEntry>>,
    capacity: usize,
    metrics: RwLock<VecDeque<SystemMetrics>>,
    metrics_max_age_hours: i64,
    system_checks: bool,
    sampler: Arc<std::sync::Mutex<HostSampler>>,
    started_at: Instant,
}

impl MonitorService {
    pub fn new(store: Arc<StateManager>, settings: MonitorSettings) -> Self {
        let capacity = settings.error_log_capacity;
        Self {
            store,
            components: DashMap::new(),
            errors: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            metrics: RwLock::new(VecDeque::new()),
            metrics_max_age_hours: settings.metrics_max_age_hours.max(1),
            system_checks: settings.system_checks,
            sampler: Arc::new(std::sync::Mutex::new(HostSampler::new())),
            started_at: Instant::now(),
        }
    }

    /// Runs `read` against the host sampler off the async runtime.
    async fn with_sampler<R, F>(&self, read: F) -> ServiceResult<R>
    where
        F: FnOnce(&mut HostSampler) -> R + Send + 'static,
        R: Send + 'static,
    {
        let sampler = self.sampler.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = sampler
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            read(&mut *guard)
        })
        .await
        .map_err(|e| ServiceError::InternalError(format!("system sampling failed: {}", e)))
    }

    pub fn update_component_status(
        &self,
        name: &str,
        status: ComponentHealth,
        details: Map<String, Value>,
    ) {
        self.components.insert(
            name.to_string(),
            ComponentStatus {
                name: name.to_string(),
                status,
                details,
                last_check: Utc::now(),
            },
        );
    }

    pub fn component_status(&self, name: &str) -> Option<ComponentStatus> {
        self.components.get(name).map(|c| c.value().clone())
    }

    pub fn components(&self) -> Vec<ComponentStatus> {
        let mut all: Vec<ComponentStatus> =
            self.components.iter().map(|c| c.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Appends an entry, evicting the oldest once capacity is reached.
    pub async fn record_error(&self, entry: ErrorLogEntry) {
        debug!(
            status = entry.status_code,
            path = %entry.path,
            error_type = %entry.error_type,
            "Recording error response"
        );
        let mut errors = self.errors.write().await;
        while errors.len() >= self.capacity {
            errors.pop_front();
        }
        errors.push_back(entry);
    }

    /// Newest first.
    pub async fn error_logs(&self, query: &ErrorLogQuery) -> Vec<ErrorLogEntry> {
        let cutoff = query.hours.and_then(lookback_cutoff);
        let errors = self.errors.read().await;
        let matching = errors.iter().rev().filter(|e| {
            cutoff.map_or(true, |c| e.timestamp > c)
                && query
                    .error_type
                    .as_deref()
                    .map_or(true, |t| e.error_type == t)
                && query
                    .component
                    .as_deref()
                    .map_or(true, |c| e.component.as_deref() == Some(c))
                && query.status_code.map_or(true, |s| e.status_code == s)
        });
        match query.limit.filter(|l| *l > 0) {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        }
    }

    #[instrument(skip(self))]
    pub async fn error_summary(&self, hours: Option<i64>) -> ErrorSummary {
        let logs = self
            .error_logs(&ErrorLogQuery {
                hours,
                ..Default::default()
            })
            .await;

        let mut summary = ErrorSummary {
            count: logs.len(),
            time_period_hours: hours,
            time_range: None,
            by_type: BTreeMap::new(),
            by_status: BTreeMap::new(),
            by_path: BTreeMap::new(),
            by_component: BTreeMap::new(),
            recent: logs.iter().take(5).cloned().collect(),
        };
        for log in &logs {
            *summary.by_type.entry(log.error_type.clone()).or_default() += 1;
            *summary.by_status.entry(log.status_code).or_default() += 1;
            *summary.by_path.entry(log.path.clone()).or_default() += 1;
            if let Some(component) = &log.component {
                *summary.by_component.entry(component.clone()).or_default() += 1;
            }
        }
        if let (Some(newest), Some(oldest)) = (logs.first(), logs.last()) {
            let seconds = (newest.timestamp - oldest.timestamp).num_seconds() as f64;
            summary.time_range = Some(TimeRange {
                oldest: oldest.timestamp,
                newest: newest.timestamp,
                duration_hours: (seconds / 3600.0 * 100.0).round() / 100.0,
            });
        }
        summary
    }

    /// Clears the error log and returns how many entries were removed.
    pub async fn clear_error_logs(&self) -> usize {
        let mut errors = self.errors.write().await;
        let count = errors.len();
        errors.clear();
        count
    }

    /// Stores a snapshot, dropping those older than the retention window.
    pub async fn record_metrics(&self, snapshot: SystemMetrics) {
        let cutoff = lookback_cutoff(self.metrics_max_age_hours);
        let mut metrics = self.metrics.write().await;
        metrics.push_back(snapshot);
        while metrics.len() > MAX_METRIC_SNAPSHOTS {
            metrics.pop_front();
        }
        if let Some(cutoff) = cutoff {
            while metrics.front().is_some_and(|m| m.timestamp < cutoff) {
                metrics.pop_front();
            }
        }
    }

    /// Samples CPU, memory and disk usage and adds the snapshot to the history.
    #[instrument(skip(self))]
    pub async fn collect_current_metrics(&self) -> ServiceResult<SystemMetrics> {
        let snapshot = self.with_sampler(HostSampler::sample).await?;
        debug!(
            cpu = snapshot.cpu_percent,
            memory = snapshot.memory_usage,
            disk = snapshot.disk_usage,
            "Collected system metrics"
        );
        self.record_metrics(snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Stored snapshots, oldest first.
    pub async fn get_metrics(&self, hours: Option<i64>) -> Vec<SystemMetrics> {
        let cutoff = hours.and_then(lookback_cutoff);
        self.metrics
            .read()
            .await
            .iter()
            .filter(|m| cutoff.map_or(true, |c| m.timestamp > c))
            .cloned()
            .collect()
    }

    pub async fn get_metrics_summary(&self, hours: Option<i64>) -> MetricsSummary {
        let metrics = self.get_metrics(hours).await;
        let (Some(first), Some(last)) = (metrics.first(), metrics.last()) else {
            return MetricsSummary {
                count: 0,
                time_period_hours: hours,
                message: Some("No metrics available".to_string()),
                time_range: None,
                averages: None,
                maximums: None,
                current: None,
            };
        };

        let count = metrics.len() as f64;
        let average = |f: fn(&SystemMetrics) -> f64| round2(metrics.iter().map(f).sum::<f64>() / count);
        let maximum = |f: fn(&SystemMetrics) -> f64| metrics.iter().map(f).fold(f64::MIN, f64::max);

        MetricsSummary {
            count: metrics.len(),
            time_period_hours: hours,
            message: None,
            time_range: Some(MetricsTimeRange {
                start: first.timestamp,
                end: last.timestamp,
            }),
            averages: Some(MetricAggregates {
                cpu_percent: average(|m| m.cpu_percent),
                memory_usage: average(|m| m.memory_usage),
                disk_usage: average(|m| m.disk_usage),
            }),
            maximums: Some(MetricAggregates {
                cpu_percent: maximum(|m| m.cpu_percent),
                memory_usage: maximum(|m| m.memory_usage),
                disk_usage: maximum(|m| m.disk_usage),
            }),
            current: Some(last.clone()),
        }
    }

    /// Updates the `disk` component from free space on the root filesystem.
    pub async fn check_disk_status(&self) -> ServiceResult<ComponentStatus> {
        let (status, details) = match self.with_sampler(HostSampler::disk).await? {
            Some(disk) => {
                let used = disk.total.saturating_sub(disk.available);
                let percent_free = percent(disk.available, disk.total);
                (
                    disk_health(percent_free),
                    json!({
                        "total_gb": gigabytes(disk.total),
                        "used_gb": gigabytes(used),
                        "free_gb": gigabytes(disk.available),
                        "percent_used": percent(used, disk.total),
                        "percent_free": percent_free,
                    }),
                )
            }
            None => (
                ComponentHealth::Unknown,
                json!({ "error": "no mounted disks reported" }),
            ),
        };
        if status >= ComponentHealth::Warning {
            warn!(?status, "Disk space is running low");
        }
        self.update_component_status("disk", status, details.as_object().cloned().unwrap_or_default());
        self.component_status("disk")
            .ok_or_else(|| ServiceError::InternalError("disk component missing".to_string()))
    }

    /// Updates the `memory` component from the share of available memory.
    pub async fn check_memory_status(&self) -> ServiceResult<ComponentStatus> {
        let memory = self.with_sampler(HostSampler::memory).await?;
        let percent_available = percent(memory.available, memory.total);
        let status = if memory.total == 0 {
            ComponentHealth::Unknown
        } else {
            memory_health(percent_available)
        };
        if status >= ComponentHealth::Warning {
            warn!(?status, "Available memory is running low");
        }
        let details = json!({
            "total_gb": gigabytes(memory.total),
            "available_gb": gigabytes(memory.available),
            "used_gb": gigabytes(memory.used),
            "percent_used": percent(memory.used, memory.total),
            "percent_available": percent_available,
        });
        self.update_component_status("memory", status, details.as_object().cloned().unwrap_or_default());
        self.component_status("memory")
            .ok_or_else(|| ServiceError::InternalError("memory component missing".to_string()))
    }

    pub async fn get_system_info(&self) -> ServiceResult<SystemInfo> {
        self.with_sampler(HostSampler::info).await
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Refreshes built-in components and aggregates every component status.
    #[instrument(skip(self))]
    pub async fn health(&self) -> HealthReport {
        let documents = self.store.counts();
        self.update_component_status(
            "state_manager",
            ComponentHealth::Healthy,
            json!({
                "materials": documents.materials,
                "requisitions": documents.requisitions,
                "orders": documents.orders,
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        );

        let (entries, server_errors) = {
            let errors = self.errors.read().await;
            let cutoff = lookback_cutoff(1);
            let server_errors = errors
                .iter()
                .filter(|e| e.status_code >= 500 && cutoff.map_or(true, |c| e.timestamp > c))
                .count();
            (errors.len(), server_errors)
        };
        let error_log_health = if server_errors > 0 {
            ComponentHealth::Warning
        } else {
            ComponentHealth::Healthy
        };
        self.update_component_status(
            "error_log",
            error_log_health,
            json!({
                "entries": entries,
                "capacity": self.capacity,
                "server_errors_last_hour": server_errors,
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        );

        if self.system_checks {
            for check in [self.check_disk_status().await, self.check_memory_status().await] {
                if let Err(e) = check {
                    warn!("System check failed: {}", e);
                }
            }
        }

        let components = self.components();
        let status = components
            .iter()
            .map(|c| c.status)
            .filter(|s| *s != ComponentHealth::Unknown)
            .max()
            .unwrap_or(ComponentHealth::Healthy);

        HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            timestamp: Utc::now(),
            documents,
            components,
        }
    }
}
