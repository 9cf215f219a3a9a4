//! Container resource statistics as reported by the stats endpoint
//!
//! Mirrors the JSON document streamed by `GET /containers/{id}/stats`,
//! keeping only the parts the dashboard charts.

use crate::nullable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One sample from the stats feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Time the sample was read, RFC 3339
    #[serde(default, deserialize_with = "nullable")]
    pub read: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cpu_stats: CpuStats,
    /// CPU counters from the previous sample, used for deltas
    #[serde(default, deserialize_with = "nullable")]
    pub precpu_stats: CpuStats,
    #[serde(default, deserialize_with = "nullable")]
    pub memory_stats: MemoryStats,
    #[serde(default, deserialize_with = "nullable")]
    pub pids_stats: PidsStats,
    #[serde(default, deserialize_with = "nullable")]
    pub networks: HashMap<String, NetworkStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    #[serde(default, deserialize_with = "nullable")]
    pub cpu_usage: CpuUsage,
    #[serde(default, deserialize_with = "nullable")]
    pub system_cpu_usage: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub online_cpus: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    #[serde(default, deserialize_with = "nullable")]
    pub total_usage: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub percpu_usage: Vec<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub usage_in_kernelmode: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub usage_in_usermode: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(default, deserialize_with = "nullable")]
    pub usage: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub max_usage: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PidsStats {
    #[serde(default, deserialize_with = "nullable")]
    pub current: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    #[serde(default, deserialize_with = "nullable")]
    pub rx_bytes: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub tx_bytes: u64,
}

impl ContainerStats {
    /// CPU usage in percent of one core, scaled by the number of online CPUs
    ///
    /// Same formula as `docker stats`: the container's CPU time delta over
    /// the host's CPU time delta between this sample and the previous one.
    pub fn cpu_percentage(&self) -> f64 {
        let cpu_delta = self
            .cpu_stats
            .cpu_usage
            .total_usage
            .saturating_sub(self.precpu_stats.cpu_usage.total_usage) as f64;
        let system_delta = self
            .cpu_stats
            .system_cpu_usage
            .saturating_sub(self.precpu_stats.system_cpu_usage) as f64;

        let online_cpus = match self.cpu_stats.online_cpus {
            0 => self.cpu_stats.cpu_usage.percpu_usage.len() as f64,
            n => n as f64,
        };

        if system_delta > 0.0 && cpu_delta > 0.0 {
            cpu_delta / system_delta * online_cpus * 100.0
        } else {
            0.0
        }
    }

    /// Memory usage in percent of the container's limit
    pub fn memory_percentage(&self) -> f64 {
        if self.memory_stats.limit == 0 {
            return 0.0;
        }
        self.memory_stats.usage as f64 / self.memory_stats.limit as f64 * 100.0
    }

    /// Total bytes received and transmitted over all interfaces
    pub fn network_totals(&self) -> (u64, u64) {
        self.networks
            .values()
            .fold((0, 0), |(rx, tx), n| (rx + n.rx_bytes, tx + n.tx_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "abc",
        "name": "/web",
        "read": "2024-05-01T10:00:01Z",
        "cpu_stats": {
            "cpu_usage": {"total_usage": 400000000, "percpu_usage": null},
            "system_cpu_usage": 20000000000,
            "online_cpus": 4
        },
        "precpu_stats": {
            "cpu_usage": {"total_usage": 200000000},
            "system_cpu_usage": 18000000000,
            "online_cpus": 4
        },
        "memory_stats": {"usage": 268435456, "limit": 1073741824, "stats": {"cache": 1}},
        "networks": {"eth0": {"rx_bytes": 10, "tx_bytes": 20}, "eth1": {"rx_bytes": 1, "tx_bytes": 2}},
        "blkio_stats": {}
    }"#;

    #[test]
    fn test_decode_sample() {
        let stats: ContainerStats = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(stats.id, "abc");
        assert_eq!(stats.cpu_stats.online_cpus, 4);
        assert!(stats.cpu_stats.cpu_usage.percpu_usage.is_empty());
        assert_eq!(stats.network_totals(), (11, 22));
    }

    #[test]
    fn test_cpu_percentage() {
        let stats: ContainerStats = serde_json::from_str(SAMPLE).unwrap();
        // 0.2s of 2s host time on 4 CPUs
        assert!((stats.cpu_percentage() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_cpu_percentage_falls_back_to_percpu_len() {
        let mut stats: ContainerStats = serde_json::from_str(SAMPLE).unwrap();
        stats.cpu_stats.online_cpus = 0;
        stats.cpu_stats.cpu_usage.percpu_usage = vec![1, 1];
        assert!((stats.cpu_percentage() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_cpu_percentage_without_delta() {
        let stats = ContainerStats::default();
        assert_eq!(stats.cpu_percentage(), 0.0);
    }

    #[test]
    fn test_memory_percentage() {
        let stats: ContainerStats = serde_json::from_str(SAMPLE).unwrap();
        assert!((stats.memory_percentage() - 25.0).abs() < 1e-9);
        assert_eq!(ContainerStats::default().memory_percentage(), 0.0);
    }
}
