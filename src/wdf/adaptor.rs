//! Scattering adaptors.
//!
//! An adaptor joins its children's ports and presents one adapted port to
//! its parent, so its upward wave never depends on the wave coming down
//! from the parent. Children may be connected reversed; `signs[k]` is `-1`
//! for such a child.

use crate::error::{Result, WdfError};
use crate::solver::NodalMatrix;
use crate::circuit::VertexId;

/// Waves on the port between a node and its parent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Wave {
    /// Wave sent up to the parent (reflected by the subtree)
    pub up: f64,
    /// Wave sent down from the parent (incident on the subtree)
    pub down: f64,
}

impl Wave {
    /// Port voltage.
    pub fn voltage(&self) -> f64 {
        0.5 * (self.up + self.down)
    }
}

/// Series connection: `R = Σ R_k`, `γ_k = R_k / R`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesAdaptor {
    pub resistance: f64,
    pub gammas: Vec<f64>,
    pub signs: Vec<f64>,
}

impl SeriesAdaptor {
    pub fn new(resistances: &[f64], flips: &[bool]) -> Self {
        let resistance: f64 = resistances.iter().sum();
        Self {
            resistance,
            gammas: resistances.iter().map(|r| r / resistance).collect(),
            signs: signs(flips),
        }
    }

    fn reflect(&self, children: &[usize], waves: &[Wave]) -> f64 {
        children
            .iter()
            .zip(&self.signs)
            .map(|(&c, s)| s * waves[c].up)
            .sum()
    }

    fn scatter(&self, children: &[usize], down: f64, up: f64, waves: &mut [Wave]) {
        let loop_wave = down - up;
        for ((&c, s), g) in children.iter().zip(&self.signs).zip(&self.gammas) {
            let b = s * waves[c].up;
            waves[c].down = s * (b + g * loop_wave);
        }
    }
}

/// Parallel connection: `G = Σ G_k`, weights `G_k / G`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelAdaptor {
    pub resistance: f64,
    pub weights: Vec<f64>,
    pub signs: Vec<f64>,
}

impl ParallelAdaptor {
    pub fn new(resistances: &[f64], flips: &[bool]) -> Self {
        let conductance: f64 = resistances.iter().map(|r| 1.0 / r).sum();
        Self {
            resistance: 1.0 / conductance,
            weights: resistances.iter().map(|r| 1.0 / (r * conductance)).collect(),
            signs: signs(flips),
        }
    }

    fn reflect(&self, children: &[usize], waves: &[Wave]) -> f64 {
        children
            .iter()
            .zip(&self.signs)
            .zip(&self.weights)
            .map(|((&c, s), w)| w * s * waves[c].up)
            .sum()
    }

    fn scatter(&self, children: &[usize], down: f64, up: f64, waves: &mut [Wave]) {
        let node = down + up;
        for (&c, s) in children.iter().zip(&self.signs) {
            let b = s * waves[c].up;
            waves[c].down = s * (node - b);
        }
    }
}

/// Rigid connection (R-type adaptor) with a dense scattering matrix.
///
/// Ports `0..n` are the children, port `n` is the parent. The parent port is
/// adapted: its resistance is the Thevenin resistance of the group seen from
/// the terminals, which makes `S[n][n] = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidAdaptor {
    pub resistance: f64,
    /// Row-major `(n+1) × (n+1)` scattering matrix
    pub scattering: Vec<f64>,
    ports: usize,
}

impl RigidAdaptor {
    /// Build the scattering matrix for children with port resistances
    /// `resistances` connected between `ports`, with the parent port between
    /// `terminals`.
    pub fn new(
        resistances: &[f64],
        ports: &[(VertexId, VertexId)],
        terminals: (VertexId, VertexId),
    ) -> Result<Self> {
        let (s, t) = terminals;

        // Node numbering with `t` as datum
        let mut vertices: Vec<VertexId> = Vec::new();
        for &(u, v) in ports.iter().chain(std::iter::once(&terminals)) {
            for x in [u, v] {
                if x != t && !vertices.contains(&x) {
                    vertices.push(x);
                }
            }
        }
        let index = |x: VertexId| vertices.iter().position(|&y| y == x);
        let size = vertices.len();

        let mut y = NodalMatrix::new(size);
        for (&(u, v), r) in ports.iter().zip(resistances) {
            y.stamp_conductance(index(u), index(v), 1.0 / r);
        }

        // Thevenin resistance: unit current into s
        let s_index = index(s).ok_or_else(|| {
            WdfError::decomposition("rigid group terminals coincide")
        })?;
        let mut unit = vec![0.0; size];
        unit[s_index] = 1.0;
        let resistance = y.solve(&unit)?[s_index];
        if !resistance.is_finite() || resistance <= 0.0 {
            return Err(WdfError::SingularMatrix);
        }

        y.stamp_conductance(Some(s_index), None, 1.0 / resistance);

        let n = ports.len();
        let all_ports: Vec<(VertexId, VertexId)> =
            ports.iter().copied().chain(std::iter::once(terminals)).collect();
        let all_r: Vec<f64> = resistances
            .iter()
            .copied()
            .chain(std::iter::once(resistance))
            .collect();

        let voltage = |z: &[f64], x: VertexId| index(x).map_or(0.0, |i| z[i]);
        let mut scattering = vec![0.0; (n + 1) * (n + 1)];
        for (j, (&(u, v), r)) in all_ports.iter().zip(&all_r).enumerate() {
            let mut rhs = vec![0.0; size];
            if let Some(i) = index(u) {
                rhs[i] += 1.0 / r;
            }
            if let Some(i) = index(v) {
                rhs[i] -= 1.0 / r;
            }
            let z = y.solve(&rhs)?;
            for (k, &(uk, vk)) in all_ports.iter().enumerate() {
                let delta = if k == j { 1.0 } else { 0.0 };
                scattering[k * (n + 1) + j] = 2.0 * (voltage(&z, uk) - voltage(&z, vk)) - delta;
            }
        }
        scattering[n * (n + 1) + n] = 0.0;

        Ok(Self {
            resistance,
            scattering,
            ports: n,
        })
    }

    fn entry(&self, row: usize, col: usize) -> f64 {
        self.scattering[row * (self.ports + 1) + col]
    }

    fn reflect(&self, children: &[usize], waves: &[Wave]) -> f64 {
        let n = self.ports;
        children
            .iter()
            .enumerate()
            .map(|(j, &c)| self.entry(n, j) * waves[c].up)
            .sum()
    }

    fn scatter(&self, children: &[usize], down: f64, waves: &mut [Wave]) {
        let n = self.ports;
        for (k, &ck) in children.iter().enumerate() {
            let mut a = self.entry(k, n) * down;
            for (j, &cj) in children.iter().enumerate() {
                a += self.entry(k, j) * waves[cj].up;
            }
            waves[ck].down = a;
        }
    }
}

/// Any adaptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Adaptor {
    Series(SeriesAdaptor),
    Parallel(ParallelAdaptor),
    Rigid(RigidAdaptor),
}

impl Adaptor {
    /// Adapted port resistance seen by the parent.
    pub fn port_resistance(&self) -> f64 {
        match self {
            Adaptor::Series(a) => a.resistance,
            Adaptor::Parallel(a) => a.resistance,
            Adaptor::Rigid(a) => a.resistance,
        }
    }

    /// Wave sent to the parent, from the children's upward waves.
    pub fn reflect(&self, children: &[usize], waves: &[Wave]) -> f64 {
        match self {
            Adaptor::Series(a) => a.reflect(children, waves),
            Adaptor::Parallel(a) => a.reflect(children, waves),
            Adaptor::Rigid(a) => a.reflect(children, waves),
        }
    }

    /// Write the children's downward waves given this port's waves.
    pub fn scatter(&self, children: &[usize], wave: Wave, waves: &mut [Wave]) {
        match self {
            Adaptor::Series(a) => a.scatter(children, wave.down, wave.up, waves),
            Adaptor::Parallel(a) => a.scatter(children, wave.down, wave.up, waves),
            Adaptor::Rigid(a) => a.scatter(children, wave.down, waves),
        }
    }

    /// All coefficients are finite.
    pub fn is_finite(&self) -> bool {
        let coefficients: &[f64] = match self {
            Adaptor::Series(a) => &a.gammas,
            Adaptor::Parallel(a) => &a.weights,
            Adaptor::Rigid(a) => &a.scattering,
        };
        self.port_resistance().is_finite() && coefficients.iter().all(|c| c.is_finite())
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Adaptor::Series(_) => "series",
            Adaptor::Parallel(_) => "parallel",
            Adaptor::Rigid(_) => "rigid",
        }
    }
}

fn signs(flips: &[bool]) -> Vec<f64> {
    flips.iter().map(|&f| if f { -1.0 } else { 1.0 }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn waves_with_up(ups: &[f64]) -> Vec<Wave> {
        ups.iter().map(|&up| Wave { up, down: 0.0 }).collect()
    }

    #[test]
    fn test_series_two_port() {
        let a = SeriesAdaptor::new(&[1.0, 3.0], &[false, false]);
        assert_relative_eq!(a.resistance, 4.0);
        let mut waves = waves_with_up(&[1.0, 2.0]);
        let up = a.reflect(&[0, 1], &waves);
        assert_relative_eq!(up, 3.0);

        // Short circuit above: down = -up
        a.scatter(&[0, 1], -up, up, &mut waves);
        // Common current i = (down - up) / 2R = -0.75
        let i0 = (waves[0].down - waves[0].up) / 2.0;
        let i1 = (waves[1].down - waves[1].up) / (2.0 * 3.0);
        assert_relative_eq!(i0, -0.75);
        assert_relative_eq!(i1, -0.75);
        // Voltages sum to zero
        assert_relative_eq!(waves[0].voltage() + waves[1].voltage(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_shares_voltage() {
        let a = ParallelAdaptor::new(&[1.0, 2.0, 4.0], &[false, true, false]);
        let mut waves = waves_with_up(&[0.3, -0.2, 0.5]);
        let up = a.reflect(&[0, 1, 2], &waves);
        let down = 0.7;
        a.scatter(&[0, 1, 2], down, up, &mut waves);
        let v = 0.5 * (up + down);
        assert_relative_eq!(waves[0].voltage(), v, epsilon = 1e-12);
        assert_relative_eq!(waves[1].voltage(), -v, epsilon = 1e-12);
        assert_relative_eq!(waves[2].voltage(), v, epsilon = 1e-12);
    }

    #[test]
    fn test_rigid_matches_series_pair() {
        // Two ports in series between s and t through an internal vertex:
        // same answer as the series adaptor
        let s = VertexId(0);
        let m = VertexId(1);
        let t = VertexId(2);
        let rigid = RigidAdaptor::new(&[1.0, 3.0], &[(s, m), (m, t)], (s, t)).unwrap();
        assert_relative_eq!(rigid.resistance, 4.0, epsilon = 1e-12);
        assert_relative_eq!(rigid.entry(2, 2), 0.0);

        let series = SeriesAdaptor::new(&[1.0, 3.0], &[false, false]);
        let mut w1 = waves_with_up(&[0.4, -1.1]);
        let mut w2 = w1.clone();
        let up1 = rigid.reflect(&[0, 1], &w1);
        let up2 = series.reflect(&[0, 1], &w2);
        assert_relative_eq!(up1, up2, epsilon = 1e-12);

        rigid.scatter(&[0, 1], 0.9, &mut w1);
        series.scatter(&[0, 1], 0.9, up2, &mut w2);
        assert_relative_eq!(w1[0].down, w2[0].down, epsilon = 1e-12);
        assert_relative_eq!(w1[1].down, w2[1].down, epsilon = 1e-12);
    }

    #[test]
    fn test_rigid_floating_group_is_singular() {
        let s = VertexId(0);
        let t = VertexId(1);
        // Port between two vertices not connected to the terminals
        let err = RigidAdaptor::new(&[1.0], &[(VertexId(2), VertexId(3))], (s, t));
        assert!(err.is_err());
    }
}
