//! The fixed oracle catalog the oracle bandit (shiro-bandit) selects arms
//! from. PlanCache is tracked here as a [`OracleKind`] variant for bandit
//! bookkeeping, but its protocol lives in `shiro-plancache` since it needs
//! PREPARE/EXECUTE state the other oracles don't.

use std::fmt;

use crate::cert::CertOracle;
use crate::coddtest::CoddTestOracle;
use crate::dqe::DqeOracle;
use crate::dqp::DqpOracle;
use crate::groundtruth::GroundTruthOracle;
use crate::impo::ImpoOracle;
use crate::norec::NoRecOracle;
use crate::oracle::Oracle;
use crate::tlp::TlpOracle;

/// The nine oracle arms named in §4.2/§4.4. Order matches the bandit's
/// fixed arm indexing; adding a variant requires widening every bandit
/// category that enumerates oracle arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OracleKind {
    NoRec,
    Tlp,
    Dqp,
    Cert,
    CoddTest,
    Dqe,
    Impo,
    GroundTruth,
    PlanCache,
}

impl OracleKind {
    pub const ALL: [OracleKind; 9] = [
        OracleKind::NoRec,
        OracleKind::Tlp,
        OracleKind::Dqp,
        OracleKind::Cert,
        OracleKind::CoddTest,
        OracleKind::Dqe,
        OracleKind::Impo,
        OracleKind::GroundTruth,
        OracleKind::PlanCache,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OracleKind::NoRec => "NoREC",
            OracleKind::Tlp => "TLP",
            OracleKind::Dqp => "DQP",
            OracleKind::Cert => "CERT",
            OracleKind::CoddTest => "CODDTest",
            OracleKind::Dqe => "DQE",
            OracleKind::Impo => "Impo",
            OracleKind::GroundTruth => "GroundTruth",
            OracleKind::PlanCache => "PlanCache",
        }
    }
}

impl fmt::Display for OracleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The constructed, non-PlanCache oracles the orchestrator's oracle bandit
/// chooses across. `PlanCache` is intentionally absent: its
/// PREPARE/EXECUTE protocol is driven directly by `shiro-plancache`, which
/// reports its outcome through the same `OracleResult` shape.
pub struct OracleSet {
    pub norec: NoRecOracle,
    pub tlp: TlpOracle,
    pub dqp: DqpOracle,
    pub cert: CertOracle,
    pub coddtest: CoddTestOracle,
    pub dqe: DqeOracle,
    pub impo: ImpoOracle,
    pub groundtruth: GroundTruthOracle,
}

impl OracleSet {
    pub fn new(cert: CertOracle, impo: ImpoOracle, groundtruth: GroundTruthOracle) -> Self {
        Self {
            norec: NoRecOracle::default(),
            tlp: TlpOracle::default(),
            dqp: DqpOracle::default(),
            cert,
            coddtest: CoddTestOracle::default(),
            dqe: DqeOracle::default(),
            impo,
            groundtruth,
        }
    }

    /// Looks up the oracle behind a non-PlanCache [`OracleKind`]. Returns
    /// `None` for `PlanCache`, which has no entry in this set.
    pub fn get(&self, kind: OracleKind) -> Option<&dyn Oracle> {
        match kind {
            OracleKind::NoRec => Some(&self.norec),
            OracleKind::Tlp => Some(&self.tlp),
            OracleKind::Dqp => Some(&self.dqp),
            OracleKind::Cert => Some(&self.cert),
            OracleKind::CoddTest => Some(&self.coddtest),
            OracleKind::Dqe => Some(&self.dqe),
            OracleKind::Impo => Some(&self.impo),
            OracleKind::GroundTruth => Some(&self.groundtruth),
            OracleKind::PlanCache => None,
        }
    }
}

impl Default for OracleSet {
    fn default() -> Self {
        Self::new(CertOracle::default(), ImpoOracle::default(), GroundTruthOracle::disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_oracle_kind_except_plan_cache_resolves_in_a_default_set() {
        let set = OracleSet::default();
        for kind in OracleKind::ALL {
            if kind == OracleKind::PlanCache {
                assert!(set.get(kind).is_none());
            } else {
                assert!(set.get(kind).is_some(), "{kind} missing from default set");
            }
        }
    }

    #[test]
    fn kind_names_match_oracle_trait_names() {
        let set = OracleSet::default();
        assert_eq!(set.get(OracleKind::NoRec).unwrap().name(), OracleKind::NoRec.name());
        assert_eq!(set.get(OracleKind::Impo).unwrap().name(), OracleKind::Impo.name());
    }
}
