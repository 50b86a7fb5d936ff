/// Probability calibration from settled signal history.
///
/// Signal strengths are grouped into ten-point buckets (0–9, 10–19, …,
/// 90–100). Once a bucket has seen enough settled signals its observed hit
/// rate replaces the raw strength as the win probability; below that the raw
/// strength (as a fraction) is used unchanged.
use serde::{Deserialize, Serialize};

use crate::db::models::{SignalRecord, SignalStatus};

const EPS: f64 = 1e-6;
const BUCKET_WIDTH: i32 = 10;
const BUCKETS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub lower: i32,
    pub upper: i32,
    pub samples: u32,
    pub hits: u32,
}

impl CalibrationBucket {
    pub fn hit_rate(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.hits as f64 / self.samples as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedProbability {
    /// Win probability, 0.0–1.0
    pub probability: f64,
    pub is_calibrated: bool,
    pub sample_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub samples: u32,
    pub brier_raw: f64,
    pub brier_calibrated: f64,
    pub logloss_raw: f64,
    pub logloss_calibrated: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMap {
    buckets: [CalibrationBucket; BUCKETS],
    min_samples: u32,
}

fn clamp_prob(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

fn logloss(p: f64, y: f64) -> f64 {
    let p = clamp_prob(p);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

fn bucket_index(strength: i32) -> usize {
    (strength.clamp(0, 100) / BUCKET_WIDTH).min(BUCKETS as i32 - 1) as usize
}

impl CalibrationMap {
    pub fn new(min_samples: u32) -> Self {
        let mut buckets = [CalibrationBucket::default(); BUCKETS];
        for (i, b) in buckets.iter_mut().enumerate() {
            b.lower = i as i32 * BUCKET_WIDTH;
            b.upper = if i == BUCKETS - 1 {
                100
            } else {
                b.lower + BUCKET_WIDTH - 1
            };
        }
        Self {
            buckets,
            min_samples,
        }
    }

    /// Build from settled records; pending and expired ones are ignored.
    pub fn from_records(records: &[SignalRecord], min_samples: u32) -> Self {
        let mut map = Self::new(min_samples);
        for rec in records {
            map.observe_record(rec);
        }
        map
    }

    pub fn observe(&mut self, strength: i32, hit: bool) {
        let bucket = &mut self.buckets[bucket_index(strength)];
        bucket.samples += 1;
        if hit {
            bucket.hits += 1;
        }
    }

    /// Fold a newly settled record into the map.
    pub fn observe_record(&mut self, rec: &SignalRecord) {
        match rec.status {
            SignalStatus::Hit => self.observe(rec.score, true),
            SignalStatus::Miss => self.observe(rec.score, false),
            SignalStatus::Pending | SignalStatus::Expired => {}
        }
    }

    pub fn bucket(&self, strength: i32) -> &CalibrationBucket {
        &self.buckets[bucket_index(strength)]
    }

    pub fn buckets(&self) -> &[CalibrationBucket] {
        &self.buckets
    }

    pub fn calibrate(&self, strength: i32) -> CalibratedProbability {
        let bucket = self.bucket(strength);
        match bucket.hit_rate() {
            Some(rate) if bucket.samples >= self.min_samples => CalibratedProbability {
                probability: rate.clamp(0.0, 1.0),
                is_calibrated: true,
                sample_size: bucket.samples,
            },
            _ => CalibratedProbability {
                probability: strength.clamp(0, 100) as f64 / 100.0,
                is_calibrated: false,
                sample_size: bucket.samples,
            },
        }
    }

    /// Compare raw strength against calibrated probability on the given
    /// settled history. `None` when nothing has settled.
    pub fn report(&self, records: &[SignalRecord]) -> Option<CalibrationReport> {
        let mut n = 0u32;
        let (mut br_raw, mut br_cal, mut ll_raw, mut ll_cal) = (0.0, 0.0, 0.0, 0.0);
        for rec in records {
            let y = match rec.status {
                SignalStatus::Hit => 1.0,
                SignalStatus::Miss => 0.0,
                SignalStatus::Pending | SignalStatus::Expired => continue,
            };
            let raw = clamp_prob(rec.score.clamp(0, 100) as f64 / 100.0);
            let cal = clamp_prob(self.calibrate(rec.score).probability);
            br_raw += (raw - y).powi(2);
            br_cal += (cal - y).powi(2);
            ll_raw += logloss(raw, y);
            ll_cal += logloss(cal, y);
            n += 1;
        }
        if n == 0 {
            return None;
        }
        let nf = n as f64;
        Some(CalibrationReport {
            samples: n,
            brier_raw: br_raw / nf,
            brier_calibrated: br_cal / nf,
            logloss_raw: ll_raw / nf,
            logloss_calibrated: ll_cal / nf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SignalType;
    use crate::engine::fixtures::kickoff;
    use approx::assert_relative_eq;

    fn settled(score: i32, hit: bool) -> SignalRecord {
        SignalRecord {
            key: format!("k{}", score),
            fixture_id: 1,
            signal_type: SignalType::LateGoal,
            trigger_minute: 80,
            trigger_home_score: 0,
            trigger_away_score: 0,
            score,
            confidence: 60,
            scenario: "GENERIC".into(),
            status: if hit {
                SignalStatus::Hit
            } else {
                SignalStatus::Miss
            },
            goal_minute: None,
            settlement_note: None,
            created_at: kickoff(),
            settled_at: None,
        }
    }

    #[test]
    fn bucket_boundaries() {
        let map = CalibrationMap::new(5);
        assert_eq!(map.bucket(0).lower, 0);
        assert_eq!(map.bucket(9).upper, 9);
        assert_eq!(map.bucket(10).lower, 10);
        assert_eq!(map.bucket(100).lower, 90);
        assert_eq!(map.bucket(100).upper, 100);
        assert_eq!(map.bucket(-4).lower, 0);
    }

    #[test]
    fn falls_back_to_raw_strength_when_thin() {
        let mut map = CalibrationMap::new(5);
        for _ in 0..4 {
            map.observe(72, true);
        }
        let c = map.calibrate(75);
        assert!(!c.is_calibrated);
        assert_eq!(c.sample_size, 4);
        assert_relative_eq!(c.probability, 0.75, epsilon = 1e-9);
    }

    #[test]
    fn uses_hit_rate_once_populated() {
        let mut records = Vec::new();
        for i in 0..10 {
            records.push(settled(80 + i % 5, i < 4));
        }
        let map = CalibrationMap::from_records(&records, 10);
        let c = map.calibrate(88);
        assert!(c.is_calibrated);
        assert_eq!(c.sample_size, 10);
        assert_relative_eq!(c.probability, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn pending_records_are_ignored() {
        let mut rec = settled(81, true);
        rec.status = SignalStatus::Pending;
        let map = CalibrationMap::from_records(&[rec], 1);
        assert_eq!(map.bucket(81).samples, 0);
    }

    #[test]
    fn report_shows_calibration_gain_on_overconfident_history() {
        // strengths around 85 but only a quarter of them hit
        let records: Vec<_> = (0..40).map(|i| settled(85, i % 4 == 0)).collect();
        let map = CalibrationMap::from_records(&records, 20);
        let report = map.report(&records).unwrap();
        assert_eq!(report.samples, 40);
        assert!(report.brier_calibrated < report.brier_raw);
        assert!(report.logloss_calibrated < report.logloss_raw);
    }
}
