//! Static carrier route table.
//!
//! Air requests route on the exact three-character prefix of the normalized
//! identifier; sea requests route on a case-insensitive substring of the
//! carrier hint, first registration wins. Unmatched requests go to the
//! mode's fallback driver. The table is read-only once built.

use std::collections::HashSet;
use std::sync::Arc;

use crate::drivers::{
    AfKlm, AirIndia, ChinaAirlines, CmaCgm, Driver, Etihad, HapagLloyd, Saudia, SilkWay,
    TrackTrace,
};
use crate::error::AppError;
use crate::models::{Mode, PREFIX_LEN, TrackingRequest};
use crate::traits::CaptchaSolver;

pub struct RouteTable {
    air: Vec<(String, Arc<dyn Driver>)>,
    sea: Vec<(String, Arc<dyn Driver>)>,
    air_fallback: Arc<dyn Driver>,
    sea_fallback: Arc<dyn Driver>,
}

impl RouteTable {
    pub fn builder(air_fallback: Arc<dyn Driver>, sea_fallback: Arc<dyn Driver>) -> RouteTableBuilder {
        RouteTableBuilder {
            air: Vec::new(),
            sea: Vec::new(),
            air_fallback,
            sea_fallback,
        }
    }

    /// Every production carrier driver, with the track-trace fallbacks.
    pub fn standard(solver: Arc<dyn CaptchaSolver>) -> Result<Self, AppError> {
        let silk_way: Arc<dyn Driver> = Arc::new(SilkWay);
        let af_klm: Arc<dyn Driver> = Arc::new(AfKlm);

        Self::builder(Arc::new(TrackTrace::air()), Arc::new(TrackTrace::sea()))
            .air("098", Arc::new(AirIndia))
            .air("607", Arc::new(Etihad))
            .air("297", Arc::new(ChinaAirlines::new(solver)))
            .air("501", silk_way.clone())
            .air("463", silk_way)
            .air("057", af_klm.clone())
            .air("074", af_klm)
            .air("065", Arc::new(Saudia))
            .sea("hapag", Arc::new(HapagLloyd))
            .sea("cma", Arc::new(CmaCgm))
            .build()
    }

    /// Pick the driver for `request`. Depends on nothing but the request.
    pub fn select(&self, request: &TrackingRequest) -> Arc<dyn Driver> {
        match request.mode {
            Mode::Air => {
                let prefix = request.identifier.prefix();
                self.air
                    .iter()
                    .find(|(key, _)| key == prefix)
                    .map(|(_, driver)| driver.clone())
                    .unwrap_or_else(|| self.air_fallback.clone())
            }
            Mode::Sea => {
                let hint = request.carrier_hint.to_lowercase();
                self.sea
                    .iter()
                    .find(|(pattern, _)| hint.contains(pattern.as_str()))
                    .map(|(_, driver)| driver.clone())
                    .unwrap_or_else(|| self.sea_fallback.clone())
            }
        }
    }

    /// Registered `(key, driver name)` pairs for a mode, in priority order.
    pub fn routes(&self, mode: Mode) -> Vec<(&str, &'static str)> {
        let routes = match mode {
            Mode::Air => &self.air,
            Mode::Sea => &self.sea,
        };
        routes
            .iter()
            .map(|(key, driver)| (key.as_str(), driver.name()))
            .collect()
    }
}

pub struct RouteTableBuilder {
    air: Vec<(String, Arc<dyn Driver>)>,
    sea: Vec<(String, Arc<dyn Driver>)>,
    air_fallback: Arc<dyn Driver>,
    sea_fallback: Arc<dyn Driver>,
}

impl RouteTableBuilder {
    /// Route an air waybill prefix to `driver`.
    pub fn air(mut self, prefix: &str, driver: Arc<dyn Driver>) -> Self {
        self.air.push((prefix.to_string(), driver));
        self
    }

    /// Route carrier hints containing `pattern` (any case) to `driver`.
    pub fn sea(mut self, pattern: &str, driver: Arc<dyn Driver>) -> Self {
        self.sea.push((pattern.to_lowercase(), driver));
        self
    }

    /// Validate and freeze the table. Duplicate keys are a configuration
    /// error, as are prefixes of the wrong length and empty hint patterns.
    pub fn build(self) -> Result<RouteTable, AppError> {
        let mut seen = HashSet::new();
        for (prefix, _) in &self.air {
            if prefix.chars().count() != PREFIX_LEN {
                return Err(AppError::ConfigError(format!(
                    "Air route prefix '{prefix}' must be {PREFIX_LEN} characters"
                )));
            }
            if !seen.insert(prefix.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Air route prefix '{prefix}' registered twice"
                )));
            }
        }

        let mut seen = HashSet::new();
        for (pattern, _) in &self.sea {
            if pattern.trim().is_empty() {
                return Err(AppError::ConfigError("Sea route pattern is empty".into()));
            }
            if !seen.insert(pattern.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Sea route pattern '{pattern}' registered twice"
                )));
            }
        }

        Ok(RouteTable {
            air: self.air,
            sea: self.sea,
            air_fallback: self.air_fallback,
            sea_fallback: self.sea_fallback,
        })
    }
}
