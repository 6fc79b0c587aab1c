//! Synthetic cycler data for demos and tests.
//!
//! Each cycle is rest → discharge → rest → charge. Capacity along a
//! half-cycle is a linear background plus a logistic step centred on the
//! plateau voltage, so dQ/dV has one sharp peak per half-cycle whose sign
//! follows the current.

use std::io::Write;

use crate::data::filter::{CAPACITY, CURRENT, DQDV, SPECIFIC_CAPACITY, VOLTAGE};
use crate::data::model::{CellState, RawReading};
use crate::error::Result;

/// Shape of every synthetic cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleProfile {
    pub upper_voltage: f64,
    pub lower_voltage: f64,
    /// Specific capacity reached on every discharge, mAh/g.
    pub discharge_capacity: f64,
    /// Charge/discharge ratio of the first cycle.
    pub first_efficiency: f64,
    /// Charge/discharge ratio of later cycles.
    pub later_efficiency: f64,
    pub discharge_plateau_voltage: f64,
    pub charge_plateau_voltage: f64,
    pub plateau_width: f64,
    /// Share of the capacity delivered by the plateau step.
    pub plateau_fraction: f64,
    pub points_per_half_cycle: usize,
    pub rest_points: usize,
    /// Magnitude of the applied current, mA.
    pub current: f64,
    /// Active material mass, g.
    pub active_mass: f64,
    /// Standard deviation of Gaussian noise added to dQ/dV.
    pub dqdv_noise: f64,
}

impl Default for CycleProfile {
    fn default() -> Self {
        Self {
            upper_voltage: 1.5,
            lower_voltage: 0.01,
            discharge_capacity: 350.0,
            first_efficiency: 0.85,
            later_efficiency: 0.98,
            discharge_plateau_voltage: 0.12,
            charge_plateau_voltage: 0.45,
            plateau_width: 0.02,
            plateau_fraction: 0.6,
            points_per_half_cycle: 800,
            rest_points: 5,
            current: 0.5,
            active_mass: 0.005,
            dqdv_noise: 0.5,
        }
    }
}

/// Generator for a multi-cycle export.
#[derive(Debug, Clone)]
pub struct SyntheticCycler {
    pub profile: CycleProfile,
    pub cycles: u32,
}

impl SyntheticCycler {
    pub fn new(profile: CycleProfile, cycles: u32) -> Self {
        Self { profile, cycles }
    }

    /// Readings of every cycle in recording order.
    pub fn readings(&self, seed: u64) -> Vec<RawReading> {
        self.rows(seed).into_iter().map(|(_, r)| r).collect()
    }

    /// Write a CSV export in the cycler's column layout.
    pub fn write_csv<W: Write>(&self, seed: u64, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["Record", "Cycle", CURRENT, CAPACITY, SPECIFIC_CAPACITY, VOLTAGE, DQDV])?;
        for (cycle, r) in self.rows(seed) {
            wtr.write_record(&[
                (r.record_index + 1).to_string(),
                cycle.to_string(),
                r.current.to_string(),
                r.capacity.to_string(),
                r.specific_capacity.to_string(),
                r.voltage.to_string(),
                r.dqdv.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn rows(&self, seed: u64) -> Vec<(u32, RawReading)> {
        let mut rng = SimpleRng::new(seed);
        let mut rows = Vec::new();
        let p = &self.profile;

        for cycle in 1..=self.cycles {
            let efficiency = if cycle == 1 {
                p.first_efficiency
            } else {
                p.later_efficiency
            };
            self.push_rest(&mut rows, cycle, p.upper_voltage);
            self.push_half(&mut rows, &mut rng, cycle, CellState::Discharge, p.discharge_capacity);
            self.push_rest(&mut rows, cycle, p.lower_voltage);
            self.push_half(
                &mut rows,
                &mut rng,
                cycle,
                CellState::Charge,
                p.discharge_capacity * efficiency,
            );
        }
        rows
    }

    fn push_rest(&self, rows: &mut Vec<(u32, RawReading)>, cycle: u32, voltage: f64) {
        for _ in 0..self.profile.rest_points {
            let record_index = rows.len();
            rows.push((
                cycle,
                RawReading {
                    record_index,
                    current: 0.0,
                    capacity: 0.0,
                    specific_capacity: 0.0,
                    voltage,
                    dqdv: 0.0,
                },
            ));
        }
    }

    fn push_half(
        &self,
        rows: &mut Vec<(u32, RawReading)>,
        rng: &mut SimpleRng,
        cycle: u32,
        state: CellState,
        total: f64,
    ) {
        let p = &self.profile;
        let span = p.upper_voltage - p.lower_voltage;
        let n = p.points_per_half_cycle.max(2);
        let background = 1.0 - p.plateau_fraction;

        for i in 0..n {
            let t = i as f64 / (n - 1) as f64;
            // Discharge runs top → bottom, charge bottom → top.
            let (voltage, centre, sign, current) = match state {
                CellState::Discharge => (
                    p.upper_voltage - t * span,
                    p.discharge_plateau_voltage,
                    -1.0,
                    -p.current,
                ),
                _ => (
                    p.lower_voltage + t * span,
                    p.charge_plateau_voltage,
                    1.0,
                    p.current,
                ),
            };
            let step = logistic(sign * (voltage - centre) / p.plateau_width);
            let shape = background * t + p.plateau_fraction * step;
            let slope = sign
                * (background / span + p.plateau_fraction * step * (1.0 - step) / p.plateau_width);

            let specific_capacity = total * shape;
            let record_index = rows.len();
            rows.push((
                cycle,
                RawReading {
                    record_index,
                    current,
                    capacity: specific_capacity * p.active_mass,
                    specific_capacity,
                    voltage,
                    dqdv: total * slope + rng.gauss(0.0, p.dqdv_noise),
                },
            ));
        }
    }
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ---------------------------------------------------------------------------
// Deterministic PRNG
// ---------------------------------------------------------------------------

/// Minimal deterministic PRNG (xoshiro256**)
pub struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    pub fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_cycles_have_the_expected_signs() {
        let readings = SyntheticCycler::new(CycleProfile::default(), 1).readings(1);
        let p = CycleProfile::default();
        assert_eq!(readings.len(), 2 * (p.rest_points + p.points_per_half_cycle));

        let discharge: Vec<&RawReading> = readings.iter().filter(|r| r.current < 0.0).collect();
        let charge: Vec<&RawReading> = readings.iter().filter(|r| r.current > 0.0).collect();
        assert!(discharge.windows(2).all(|w| w[1].voltage < w[0].voltage));
        assert!(charge.windows(2).all(|w| w[1].voltage > w[0].voltage));
        assert!(discharge.windows(2).all(|w| w[1].specific_capacity > w[0].specific_capacity));
        assert!(discharge.iter().map(|r| r.dqdv).sum::<f64>() < 0.0);
        assert!(charge.iter().map(|r| r.dqdv).sum::<f64>() > 0.0);
    }

    #[test]
    fn same_seed_same_data() {
        let cycler = SyntheticCycler::new(CycleProfile::default(), 2);
        assert_eq!(cycler.readings(9), cycler.readings(9));
    }
}
