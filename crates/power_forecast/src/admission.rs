//! Resource admission for forecast tasks.
//!
//! This module provides:
//! - `ThermalSensor`: device temperature reading, with a `sysinfo` backed
//!   implementation plus fixed and scripted sensors for tests
//! - `CancellationToken`: run-wide cancellation with a recorded reason
//! - `ConcurrencyGate`: a counting semaphore bounding in-flight tasks
//! - `AdmissionController`: permit, then temperature check, then admit or defer
//!
//! A task that keeps being deferred for longer than the configured maximum
//! wait cancels the whole run with [`CancelReason::ThermalCeiling`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use sysinfo::Components;
use thiserror::Error;
use tracing::{debug, warn};

/// Sensor read failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// No temperature component is visible.
    #[error("No temperature sensor available")]
    NoSensor,
    /// The read itself failed.
    #[error("Sensor read failed: {0}")]
    Read(String),
}

/// Device temperature source consulted before each task attempt.
pub trait ThermalSensor: Send + Sync {
    /// Sensor name for logs.
    fn name(&self) -> &str;

    /// Current temperature in degrees Celsius.
    fn read_celsius(&self) -> Result<f64, SensorError>;
}

/// Always reports the same temperature.
#[derive(Clone, Copy, Debug)]
pub struct FixedSensor(pub f64);

impl ThermalSensor for FixedSensor {
    fn name(&self) -> &str {
        "fixed"
    }

    fn read_celsius(&self) -> Result<f64, SensorError> {
        Ok(self.0)
    }
}

/// Replays a scripted sequence of readings, then repeats the last one.
#[derive(Debug)]
pub struct ScriptedSensor {
    readings: Mutex<VecDeque<Result<f64, SensorError>>>,
    last: Mutex<Result<f64, SensorError>>,
    reads: AtomicUsize,
}

impl ScriptedSensor {
    /// Sensor replaying `readings` in order.
    pub fn new(readings: impl IntoIterator<Item = f64>) -> Self {
        Self::with_results(readings.into_iter().map(Ok))
    }

    /// Sensor replaying readings that may include failures.
    pub fn with_results(readings: impl IntoIterator<Item = Result<f64, SensorError>>) -> Self {
        Self {
            readings: Mutex::new(readings.into_iter().collect()),
            last: Mutex::new(Err(SensorError::NoSensor)),
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of reads so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ThermalSensor for ScriptedSensor {
    fn name(&self) -> &str {
        "scripted"
    }

    fn read_celsius(&self) -> Result<f64, SensorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.readings.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = queue.pop_front() {
            *last = next;
        }
        last.clone()
    }
}

/// Reads the hottest matching hardware component via `sysinfo`.
///
/// Components whose label contains one of the configured fragments
/// (case-insensitive) are considered; with no fragments every component is.
pub struct SysinfoSensor {
    components: Mutex<Components>,
    label_filters: Vec<String>,
}

impl SysinfoSensor {
    /// Sensor preferring GPU-like labels.
    pub fn gpu() -> Self {
        Self::with_filters(["gpu", "amdgpu", "nvidia", "radeon"])
    }

    /// Sensor over components whose label matches one of `filters`.
    pub fn with_filters<S: Into<String>>(filters: impl IntoIterator<Item = S>) -> Self {
        Self {
            components: Mutex::new(Components::new_with_refreshed_list()),
            label_filters: filters.into_iter().map(|s| s.into().to_lowercase()).collect(),
        }
    }

    fn matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.label_filters.is_empty() || self.label_filters.iter().any(|f| label.contains(f))
    }
}

impl ThermalSensor for SysinfoSensor {
    fn name(&self) -> &str {
        "sysinfo"
    }

    fn read_celsius(&self) -> Result<f64, SensorError> {
        let mut components = self.components.lock().unwrap_or_else(|e| e.into_inner());
        components.refresh();
        let readings: Vec<(bool, f64)> = components
            .list()
            .iter()
            .map(|c| (self.matches(c.label()), f64::from(c.temperature())))
            .filter(|(_, t)| t.is_finite())
            .collect();
        // Fall back to any component when no label matches.
        let preferred = readings.iter().filter(|(m, _)| *m).map(|(_, t)| *t).reduce(f64::max);
        preferred
            .or_else(|| readings.iter().map(|(_, t)| *t).reduce(f64::max))
            .ok_or(SensorError::NoSensor)
    }
}

/// Why a run was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CancelReason {
    /// Aborted by the caller.
    External,
    /// A task waited too long for the device to cool down.
    ThermalCeiling {
        /// Last reading, if the sensor produced one
        temperature_c: Option<f64>,
        /// Configured ceiling
        ceiling_c: f64,
    },
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::External => write!(f, "cancelled externally"),
            CancelReason::ThermalCeiling {
                temperature_c: Some(t),
                ceiling_c,
            } => write!(f, "thermal ceiling {:.1}C exceeded ({:.1}C)", ceiling_c, t),
            CancelReason::ThermalCeiling {
                temperature_c: None,
                ceiling_c,
            } => write!(f, "thermal ceiling {:.1}C unverifiable (sensor unavailable)", ceiling_c),
        }
    }
}

/// Shared run cancellation flag. The first recorded reason wins.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<CancelReason>>>,
}

impl CancellationToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels with `reason`. Returns false if already cancelled.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let mut slot = self.reason.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.flag.store(true, Ordering::SeqCst);
        true
    }

    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The recorded reason, if cancelled.
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[derive(Debug)]
struct GateState {
    limit: usize,
    in_flight: Mutex<usize>,
    released: Condvar,
    peak: AtomicUsize,
}

/// Counting semaphore bounding concurrent tasks.
#[derive(Clone, Debug)]
pub struct ConcurrencyGate {
    state: Arc<GateState>,
}

/// A held slot. Released on drop.
#[derive(Debug)]
pub struct Permit {
    state: Arc<GateState>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut n = self.state.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *n = n.saturating_sub(1);
        self.state.released.notify_one();
    }
}

const GATE_POLL: Duration = Duration::from_millis(10);

impl ConcurrencyGate {
    /// Gate admitting at most `limit` holders (minimum one).
    pub fn new(limit: usize) -> Self {
        Self {
            state: Arc::new(GateState {
                limit: limit.max(1),
                in_flight: Mutex::new(0),
                released: Condvar::new(),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Maximum concurrent holders.
    pub fn limit(&self) -> usize {
        self.state.limit
    }

    /// Current holders.
    pub fn in_flight(&self) -> usize {
        *self.state.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Highest number of simultaneous holders observed.
    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    /// Blocks until a slot is free or `token` is cancelled.
    pub fn acquire(&self, token: &CancellationToken) -> Option<Permit> {
        let mut n = self.state.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        while *n >= self.state.limit {
            if token.is_cancelled() {
                return None;
            }
            n = match self.state.released.wait_timeout(n, GATE_POLL) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        if token.is_cancelled() {
            return None;
        }
        *n += 1;
        self.state.peak.fetch_max(*n, Ordering::SeqCst);
        Some(Permit {
            state: Arc::clone(&self.state),
        })
    }
}

/// Thresholds for the admission check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdmissionConfig {
    /// Maximum device temperature at which a task may start
    pub thermal_ceiling_c: f64,
    /// Wait between temperature samples while deferred
    pub poll_interval: Duration,
    /// Longest a task may be deferred before the run is cancelled
    pub max_thermal_wait: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            thermal_ceiling_c: 85.0,
            poll_interval: Duration::from_millis(500),
            max_thermal_wait: Duration::from_secs(300),
        }
    }
}

/// Counters exposed by [`AdmissionController::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AdmissionStats {
    /// Admissions granted
    pub admitted: usize,
    /// Thermal deferrals (one per poll interval waited)
    pub deferrals: usize,
    /// Highest number of simultaneously admitted tasks
    pub peak_in_flight: usize,
}

/// Permit plus thermal check before every task attempt.
pub struct AdmissionController {
    gate: ConcurrencyGate,
    sensor: Arc<dyn ThermalSensor>,
    config: AdmissionConfig,
    admitted: AtomicUsize,
    deferrals: AtomicUsize,
}

impl AdmissionController {
    /// Controller over `concurrency` slots and `sensor`.
    pub fn new(concurrency: usize, sensor: Arc<dyn ThermalSensor>, config: AdmissionConfig) -> Self {
        Self {
            gate: ConcurrencyGate::new(concurrency),
            sensor,
            config,
            admitted: AtomicUsize::new(0),
            deferrals: AtomicUsize::new(0),
        }
    }

    /// Thresholds in use.
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.gate.limit()
    }

    /// Acquires a permit and waits until the device is below the ceiling.
    ///
    /// Returns the cancellation reason instead when the run is (or becomes)
    /// cancelled. Deferring past `max_thermal_wait` cancels the run.
    pub fn admit(&self, token: &CancellationToken, task: &str) -> Result<Permit, CancelReason> {
        let cancelled = || token.reason().unwrap_or(CancelReason::External);
        if token.is_cancelled() {
            return Err(cancelled());
        }
        let permit = self.gate.acquire(token).ok_or_else(cancelled)?;
        let started = Instant::now();
        let ceiling = self.config.thermal_ceiling_c;
        let mut last_reading = None;
        loop {
            if token.is_cancelled() {
                return Err(cancelled());
            }
            match self.sensor.read_celsius() {
                Ok(t) if t <= ceiling => {
                    self.admitted.fetch_add(1, Ordering::Relaxed);
                    return Ok(permit);
                }
                Ok(t) => {
                    last_reading = Some(t);
                    debug!(task, temperature_c = t, ceiling_c = ceiling, "Task deferred: above thermal ceiling");
                }
                Err(e) => {
                    debug!(task, error = %e, sensor = self.sensor.name(), "Task deferred: sensor unreadable");
                }
            }
            if started.elapsed() >= self.config.max_thermal_wait {
                let reason = CancelReason::ThermalCeiling {
                    temperature_c: last_reading,
                    ceiling_c: ceiling,
                };
                if token.cancel(reason.clone()) {
                    warn!(task, temperature_c = ?last_reading, ceiling_c = ceiling, "Thermal wait exhausted, cancelling run");
                }
                return Err(token.reason().unwrap_or(reason));
            }
            self.deferrals.fetch_add(1, Ordering::Relaxed);
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Current counters.
    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            deferrals: self.deferrals.load(Ordering::Relaxed),
            peak_in_flight: self.gate.peak(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ms: u64, max_ms: u64) -> AdmissionConfig {
        AdmissionConfig {
            thermal_ceiling_c: 80.0,
            poll_interval: Duration::from_millis(ms),
            max_thermal_wait: Duration::from_millis(max_ms),
        }
    }

    #[test]
    fn test_admits_when_cool() {
        let ctl = AdmissionController::new(2, Arc::new(FixedSensor(40.0)), config(1, 100));
        let token = CancellationToken::new();
        let permit = ctl.admit(&token, "t").unwrap();
        assert_eq!(ctl.stats().admitted, 1);
        assert_eq!(ctl.stats().deferrals, 0);
        drop(permit);
    }

    #[test]
    fn test_defers_until_cool() {
        let sensor = Arc::new(ScriptedSensor::new([90.0, 90.0, 50.0]));
        let ctl = AdmissionController::new(1, sensor.clone(), config(1, 10_000));
        let token = CancellationToken::new();
        assert!(ctl.admit(&token, "t").is_ok());
        assert_eq!(ctl.stats().deferrals, 2);
        assert_eq!(sensor.reads(), 3);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_sensor_error_defers() {
        let sensor = Arc::new(ScriptedSensor::with_results([
            Err(SensorError::Read("i2c".into())),
            Ok(30.0),
        ]));
        let ctl = AdmissionController::new(1, sensor, config(1, 10_000));
        assert!(ctl.admit(&CancellationToken::new(), "t").is_ok());
        assert_eq!(ctl.stats().deferrals, 1);
    }

    #[test]
    fn test_thermal_wait_cancels_run() {
        let ctl = AdmissionController::new(1, Arc::new(FixedSensor(95.0)), config(2, 10));
        let token = CancellationToken::new();
        let err = ctl.admit(&token, "t").unwrap_err();
        assert!(matches!(err, CancelReason::ThermalCeiling { temperature_c: Some(t), .. } if t == 95.0));
        assert!(token.is_cancelled());
        // Subsequent admissions fail fast with the same reason.
        assert_eq!(ctl.admit(&token, "u").unwrap_err(), err);
    }

    #[test]
    fn test_external_cancel_first_reason_wins() {
        let token = CancellationToken::new();
        assert!(token.cancel(CancelReason::External));
        assert!(!token.cancel(CancelReason::ThermalCeiling {
            temperature_c: None,
            ceiling_c: 1.0
        }));
        assert_eq!(token.reason(), Some(CancelReason::External));
    }

    #[test]
    fn test_gate_bounds_concurrency() {
        let gate = ConcurrencyGate::new(3);
        let token = CancellationToken::new();
        let handles: Vec<_> = (0..12)
            .map(|_| {
                let gate = gate.clone();
                let token = token.clone();
                thread::spawn(move || {
                    let _p = gate.acquire(&token).unwrap();
                    thread::sleep(Duration::from_millis(5));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(gate.peak() <= 3);
        assert!(gate.peak() >= 1);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn test_gate_acquire_returns_none_when_cancelled() {
        let gate = ConcurrencyGate::new(1);
        let token = CancellationToken::new();
        let _held = gate.acquire(&token).unwrap();
        token.cancel(CancelReason::External);
        assert!(gate.acquire(&token).is_none());
    }

    #[test]
    fn test_reason_display() {
        let r = CancelReason::ThermalCeiling {
            temperature_c: Some(91.0),
            ceiling_c: 85.0,
        };
        assert_eq!(r.to_string(), "thermal ceiling 85.0C exceeded (91.0C)");
    }
}
