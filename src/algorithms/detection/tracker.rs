//! Cluster tracking with constant-velocity Kalman filters.
//!
//! Each track carries a 6-state filter `[px, py, pz, vx, vy, vz]`.
//! `predict` advances every track to the frame time; `correct` greedily
//! associates cluster observations to tracks by nearest centroid inside a
//! gating radius, spawns tracks for unmatched observations, and ages out
//! tracks that keep missing.

use nalgebra::{Matrix3, Matrix6, SMatrix, Vector3, Vector6};

use super::clustering::Cluster;

/// Tracker tuning parameters.
#[derive(Debug, Clone)]
pub struct TrackerParams {
    /// Association gate: maximum centroid distance in meters
    pub gating_radius: f64,
    /// Consecutive misses before a track is dropped
    pub max_misses: u32,
    /// Process noise variance (white-noise acceleration, (m/s²)²)
    pub process_noise_var: f64,
    /// Observation noise variance (m²)
    pub obs_noise_var: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            gating_radius: 2.0,
            max_misses: 5,
            process_noise_var: 1.0,
            obs_noise_var: 0.01,
        }
    }
}

/// Constant-velocity Kalman state.
#[derive(Debug, Clone)]
struct KalmanCv {
    x: Vector6<f64>,
    p: Matrix6<f64>,
}

impl KalmanCv {
    fn new(position: Vector3<f64>) -> Self {
        let mut x = Vector6::zeros();
        x.fixed_rows_mut::<3>(0).copy_from(&position);
        Self {
            x,
            p: Matrix6::identity() * 10.0,
        }
    }

    fn predict(&mut self, dt: f64, process_noise_var: f64) {
        let mut f = Matrix6::identity();
        for i in 0..3 {
            f[(i, i + 3)] = dt;
        }
        self.x = f * self.x;

        // Piecewise-constant acceleration process noise.
        let dt2 = dt * dt;
        let mut q = Matrix6::zeros();
        for i in 0..3 {
            q[(i, i)] = dt2 * dt2 / 4.0;
            q[(i, i + 3)] = dt2 * dt / 2.0;
            q[(i + 3, i)] = dt2 * dt / 2.0;
            q[(i + 3, i + 3)] = dt2;
        }
        self.p = f * self.p * f.transpose() + q * process_noise_var;
    }

    fn update(&mut self, observation: Vector3<f64>, obs_noise_var: f64) {
        let innovation = observation - self.x.fixed_rows::<3>(0).into_owned();

        // H = [I₃ | 0₃]: S = P_pp + R, K = P[:, 0..3] · S⁻¹
        let p_pp: Matrix3<f64> = self.p.fixed_view::<3, 3>(0, 0).into_owned();
        let s = p_pp + Matrix3::identity() * obs_noise_var;
        let Some(s_inv) = s.try_inverse() else {
            return;
        };
        let p_cols: SMatrix<f64, 6, 3> = self.p.fixed_view::<6, 3>(0, 0).into_owned();
        let k = p_cols * s_inv;

        self.x += k * innovation;
        let mut kh = Matrix6::zeros();
        kh.fixed_view_mut::<6, 3>(0, 0).copy_from(&k);
        self.p = (Matrix6::identity() - kh) * self.p;
    }
}

/// A tracked moving object.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique identifier, monotonically assigned
    pub id: u64,
    kalman: KalmanCv,
    /// Consecutive frames without an associated observation
    pub misses: u32,
    /// Total associated observations
    pub hits: u32,
}

impl Track {
    /// Current centroid estimate.
    pub fn centroid(&self) -> Vector3<f64> {
        self.kalman.x.fixed_rows::<3>(0).into_owned()
    }

    /// Current velocity estimate in m/s.
    pub fn velocity(&self) -> Vector3<f64> {
        self.kalman.x.fixed_rows::<3>(3).into_owned()
    }
}

/// One observation-to-track pairing from a `correct` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    /// Index into the tracker's track list
    pub track: usize,
    /// Index into the observed cluster slice
    pub observation: usize,
}

/// Multi-object cluster tracker.
#[derive(Debug, Clone, Default)]
pub struct ClusterTracker {
    tracks: Vec<Track>,
    params: TrackerParams,
    next_id: u64,
    last_time_us: Option<u64>,
}

impl ClusterTracker {
    /// Create a tracker.
    pub fn new(params: TrackerParams) -> Self {
        Self {
            tracks: Vec::new(),
            params,
            next_id: 0,
            last_time_us: None,
        }
    }

    /// Live tracks.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Advance every track to the given time.
    pub fn predict(&mut self, time_us: u64) {
        let dt = match self.last_time_us {
            Some(last) if time_us > last => (time_us - last) as f64 * 1e-6,
            _ => 0.0,
        };
        self.last_time_us = Some(time_us);
        if dt <= 0.0 {
            return;
        }
        for track in &mut self.tracks {
            track.kalman.predict(dt, self.params.process_noise_var);
        }
    }

    /// Associate observations to tracks and update the filters.
    ///
    /// Greedy nearest-centroid pairing inside the gating radius. Unmatched
    /// observations spawn new tracks (appended after the returned
    /// associations, so all returned indices stay valid); tracks that have
    /// missed too many frames are dropped before association.
    pub fn correct(&mut self, _time_us: u64, clusters: &[Cluster]) -> Vec<Association> {
        self.tracks.retain(|t| t.misses <= self.params.max_misses);

        // All gated candidate pairs, closest first.
        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            let predicted = track.centroid();
            for (ci, cluster) in clusters.iter().enumerate() {
                let distance = (cluster.centroid - predicted).norm();
                if distance <= self.params.gating_radius {
                    candidates.push((distance, ti, ci));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut track_taken = vec![false; self.tracks.len()];
        let mut cluster_taken = vec![false; clusters.len()];
        let mut associations = Vec::new();
        for (_, ti, ci) in candidates {
            if track_taken[ti] || cluster_taken[ci] {
                continue;
            }
            track_taken[ti] = true;
            cluster_taken[ci] = true;
            associations.push(Association {
                track: ti,
                observation: ci,
            });
        }

        for assoc in &associations {
            let track = &mut self.tracks[assoc.track];
            track
                .kalman
                .update(clusters[assoc.observation].centroid, self.params.obs_noise_var);
            track.hits += 1;
            track.misses = 0;
        }
        for (ti, taken) in track_taken.iter().enumerate() {
            if !taken {
                self.tracks[ti].misses += 1;
            }
        }
        for (ci, taken) in cluster_taken.iter().enumerate() {
            if !taken {
                self.tracks.push(Track {
                    id: self.next_id,
                    kalman: KalmanCv::new(clusters[ci].centroid),
                    misses: 0,
                    hits: 1,
                });
                self.next_id += 1;
            }
        }

        associations
    }
}
