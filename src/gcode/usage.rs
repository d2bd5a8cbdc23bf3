//! Filament usage accounting.
//!
//! Invoked once at job end: for each extruder that produced output, derive
//! length, volume, weight and cost from the writer's per-extruder E
//! accumulation and roll them into job totals.

use std::collections::BTreeMap;

use super::writer::Extruder;

/// Usage of one extruder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExtruderUsage {
    /// Filament length consumed (mm).
    pub length: f64,
    /// Volume extruded (mm³).
    pub volume: f64,
    /// Material weight (g).
    pub weight: f64,
    /// Material cost.
    pub cost: f64,
}

/// Job-wide usage totals plus the per-extruder breakdown.
#[derive(Debug, Clone, Default)]
pub struct UsageTotals {
    pub total_used_filament: f64,
    pub total_extruded_volume: f64,
    pub total_weight: f64,
    pub total_cost: f64,
    /// Per-extruder usage, only for extruders that produced output.
    pub per_extruder: BTreeMap<usize, ExtruderUsage>,
}

/// Computes job-end usage totals. Idempotent for a single invocation at job
/// end; not designed for incremental per-layer update.
pub struct ExtruderUsageAccumulator;

impl ExtruderUsageAccumulator {
    pub fn accumulate(extruders: &BTreeMap<usize, Extruder>) -> UsageTotals {
        let mut totals = UsageTotals::default();
        for extruder in extruders.values() {
            let length = extruder.used_filament();
            if length <= 0.0 {
                continue;
            }
            let volume = extruder.extruded_volume();
            let weight = volume * extruder.filament_density() / 1000.0;
            let cost = weight * extruder.filament_cost() / 1000.0;

            totals.total_used_filament += length;
            totals.total_extruded_volume += volume;
            // negative-density or negative-cost materials never reduce totals
            if weight > 0.0 {
                totals.total_weight += weight;
                if cost > 0.0 {
                    totals.total_cost += cost;
                }
            }
            totals.per_extruder.insert(
                extruder.id,
                ExtruderUsage {
                    length,
                    volume,
                    weight,
                    cost,
                },
            );
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrintConfig;

    fn extruder_with_usage(id: usize, config: &PrintConfig, volume: f64) -> Extruder {
        let mut extruder = Extruder::new(id, config).unwrap();
        extruder.extrude_volume(volume);
        extruder
    }

    #[test]
    fn test_two_extruders_equal_density_and_cost() {
        let mut config = PrintConfig::default();
        config.filament_diameter = vec![1.75, 1.75];
        config.filament_density = vec![1.25, 1.25];
        config.filament_cost = vec![20.0, 20.0];

        let mut extruders = BTreeMap::new();
        extruders.insert(0, extruder_with_usage(0, &config, 500.0));
        extruders.insert(1, extruder_with_usage(1, &config, 300.0));

        let totals = ExtruderUsageAccumulator::accumulate(&extruders);
        let v1 = extruders[&0].extruded_volume();
        let v2 = extruders[&1].extruded_volume();
        let expected_weight = (v1 + v2) * 1.25 / 1000.0;
        assert!((totals.total_weight - expected_weight).abs() < 1e-9);
        assert!((totals.total_cost - expected_weight * 20.0 / 1000.0).abs() < 1e-9);
        assert_eq!(totals.per_extruder.len(), 2);
    }

    #[test]
    fn test_idle_extruder_is_excluded() {
        let config = PrintConfig::default();
        let mut extruders = BTreeMap::new();
        extruders.insert(0, extruder_with_usage(0, &config, 100.0));
        extruders.insert(1, Extruder::new(1, &config).unwrap());

        let totals = ExtruderUsageAccumulator::accumulate(&extruders);
        assert_eq!(totals.per_extruder.len(), 1);
        assert!(totals.per_extruder.contains_key(&0));
    }

    #[test]
    fn test_negative_cost_material_never_reduces_totals() {
        let mut config = PrintConfig::default();
        config.filament_cost = vec![-5.0];
        let mut extruders = BTreeMap::new();
        extruders.insert(0, extruder_with_usage(0, &config, 100.0));

        let totals = ExtruderUsageAccumulator::accumulate(&extruders);
        assert!(totals.total_weight > 0.0);
        assert_eq!(totals.total_cost, 0.0);
        // the per-extruder breakdown still reports the raw value
        assert!(totals.per_extruder[&0].cost < 0.0);
    }
}
