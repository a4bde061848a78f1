// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    anyhow::{format_err, Context},
    serde::Deserialize,
    std::{fs, path::Path},
    wlan_ps_common::time::{Duration, TimeUnit},
};

/// Operating parameters shared by the AP and station halves. Loaded once at
/// startup and treated as immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Beacon interval in TUs.
    pub beacon_interval: u16,
    /// Number of beacon intervals between DTIM beacons.
    pub dtim_period: u8,
    /// Maximum number of frames buffered per power-save queue.
    pub ps_buffer_capacity: usize,
    /// Buffered frames older than this are evicted, in milliseconds.
    pub ps_buffer_max_age_ms: u64,
    /// Buffer status reports older than this revert to unknown, in
    /// milliseconds.
    pub bsr_expiry_ms: u64,
    /// Consecutive missed beacons after which a station drops its
    /// association.
    pub lost_beacon_limit: u32,
    /// How long before an expected beacon a dozing station wakes its radio,
    /// in microseconds.
    pub pre_beacon_lead_time_us: u64,
    /// Extra time past the expected beacon before it counts as missed, in
    /// microseconds.
    pub beacon_miss_margin_us: u64,
    /// Default transmission-opportunity budget, in microseconds.
    pub opportunity_budget_us: u64,
    /// Smallest viable multi-user exchange; opportunities shorter than this
    /// yield no transmission, in microseconds.
    pub min_exchange_time_us: u64,
    /// Upper bound on stations solicited by a single trigger frame.
    pub max_ru_per_trigger: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            beacon_interval: TimeUnit::DEFAULT_BEACON_INTERVAL.0,
            dtim_period: 3,
            ps_buffer_capacity: 64,
            ps_buffer_max_age_ms: 500,
            bsr_expiry_ms: 100,
            lost_beacon_limit: 10,
            pre_beacon_lead_time_us: 2_048,
            beacon_miss_margin_us: 4_096,
            opportunity_budget_us: 4_000,
            min_exchange_time_us: 300,
            max_ru_per_trigger: 9,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, anyhow::Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.beacon_interval == 0 {
            return Err(format_err!("beacon_interval must be non-zero"));
        }
        if self.dtim_period == 0 {
            return Err(format_err!("dtim_period must be non-zero"));
        }
        if self.max_ru_per_trigger == 0 {
            return Err(format_err!("max_ru_per_trigger must be non-zero"));
        }
        if Duration::from_micros(self.pre_beacon_lead_time_us as i64)
            >= self.beacon_interval_duration()
        {
            return Err(format_err!("pre_beacon_lead_time_us must be below the beacon interval"));
        }
        Ok(())
    }

    pub fn beacon_interval_duration(&self) -> Duration {
        TimeUnit(self.beacon_interval).into()
    }

    pub fn ps_buffer_max_age(&self) -> Duration {
        Duration::from_millis(self.ps_buffer_max_age_ms as i64)
    }

    pub fn bsr_expiry(&self) -> Duration {
        Duration::from_millis(self.bsr_expiry_ms as i64)
    }

    pub fn pre_beacon_lead_time(&self) -> Duration {
        Duration::from_micros(self.pre_beacon_lead_time_us as i64)
    }

    pub fn beacon_miss_margin(&self) -> Duration {
        Duration::from_micros(self.beacon_miss_margin_us as i64)
    }

    pub fn opportunity_budget(&self) -> Duration {
        Duration::from_micros(self.opportunity_budget_us as i64)
    }

    pub fn min_exchange_time(&self) -> Duration {
        Duration::from_micros(self.min_exchange_time_us as i64)
    }
}
