use serde::{Deserialize, Serialize};

use crate::core::types::Vector2;

/// How the kernel treats two bodies at (numerically) zero separation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum SeparationPolicy {
    /// Zero separation is a fatal numerical degeneracy.
    #[default]
    Fatal,
    /// Separations below `min_separation` are treated as `min_separation`.
    /// Coincident bodies contribute nothing.
    Clamp { min_separation: f64 },
}

/// Index (into the source sequence) of a body coinciding with the field point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Degeneracy {
    pub source: usize,
}

/// Direct-sum inverse-square gravity without the gravitational constant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GravityKernel {
    pub separation: SeparationPolicy,
}

impl GravityKernel {
    pub fn new(separation: SeparationPolicy) -> Self {
        Self { separation }
    }

    /// Accumulates `Σ mass * r / |r|³` with `r = source - position`.
    ///
    /// Sources are summed in iteration order; the same order always yields
    /// the same bits.
    pub fn field_at<I>(&self, position: Vector2, sources: I) -> Result<Vector2, Degeneracy>
    where
        I: IntoIterator<Item = (f64, Vector2)>,
    {
        let mut field = Vector2::ZERO;
        for (source, (mass, source_position)) in sources.into_iter().enumerate() {
            let r = source_position - position;
            let mut dist_sq = r.length_squared();
            match self.separation {
                SeparationPolicy::Fatal => {
                    if dist_sq == 0.0 {
                        return Err(Degeneracy { source });
                    }
                }
                SeparationPolicy::Clamp { min_separation } => {
                    if dist_sq == 0.0 {
                        continue;
                    }
                    dist_sq = dist_sq.max(min_separation * min_separation);
                }
            }
            let dist = dist_sq.sqrt();
            field += r * (mass / (dist_sq * dist));
        }
        Ok(field)
    }
}
