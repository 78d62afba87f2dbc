use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel domain used when a pearl carries no domain tags.
pub const OVERALL_DOMAIN: &str = "_overall";

/// Convex-combination weight applied to `H` when computing `composite`.
/// See DESIGN.md for the rationale (manual endorsement weighted above
/// inferred quality).
pub const TRUST_COMPOSITE_H_WEIGHT: f64 = 0.6;

/// Per ordered pair and per domain: manual endorsement (`h`) and inferred
/// quality (`q`) folded into a bounded `composite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScore {
    pub claw_id: String,
    pub subject_id: String,
    pub domain: String,
    pub h: f64,
    pub q: f64,
    pub composite: f64,
    pub updated_at: DateTime<Utc>,
}

impl TrustScore {
    pub fn new(claw_id: String, subject_id: String, domain: String) -> Self {
        let mut t = Self {
            claw_id,
            subject_id,
            domain,
            h: 0.5,
            q: 0.5,
            composite: 0.5,
            updated_at: Utc::now(),
        };
        t.recompute_composite();
        t
    }

    pub fn recompute_composite(&mut self) {
        let raw = TRUST_COMPOSITE_H_WEIGHT * self.h + (1.0 - TRUST_COMPOSITE_H_WEIGHT) * self.q;
        self.composite = raw.clamp(0.0, 1.0);
    }
}
