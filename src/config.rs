use crate::{AdmetRuleTable, DepictionOptions, LipinskiRules, QedParameters};

/// Everything a screening run can be tuned with. The defaults carry the
/// published Lipinski thresholds, Bickerton's QED parameters and the built-in
/// ADMET heuristics, with no depiction output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreeningConfig {
    pub lipinski: LipinskiRules,
    pub qed: QedParameters,
    pub admet: AdmetRuleTable,
    pub depiction: Option<DepictionOptions>,
}

impl ScreeningConfig {
    pub fn with_lipinski(mut self, lipinski: LipinskiRules) -> Self {
        self.lipinski = lipinski;
        self
    }

    pub fn with_qed(mut self, qed: QedParameters) -> Self {
        self.qed = qed;
        self
    }

    pub fn with_admet(mut self, admet: AdmetRuleTable) -> Self {
        self.admet = admet;
        self
    }

    pub fn with_depiction(mut self, depiction: DepictionOptions) -> Self {
        self.depiction = Some(depiction);
        self
    }

    pub fn without_depiction(mut self) -> Self {
        self.depiction = None;
        self
    }
}
