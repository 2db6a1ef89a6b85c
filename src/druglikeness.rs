use tracing::trace;

use crate::{Descriptor, DescriptorSet};

/// A Lipinski criterion: violated when the descriptor exceeds `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LipinskiRule {
    pub descriptor: Descriptor,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LipinskiRules {
    pub rules: Vec<LipinskiRule>,
    /// A structure passes with at most this many violations.
    pub max_violations: usize,
}

impl Default for LipinskiRules {
    fn default() -> Self {
        Self {
            rules: vec![
                LipinskiRule { descriptor: Descriptor::MolecularWeight, threshold: 500.0 },
                LipinskiRule { descriptor: Descriptor::LogP, threshold: 5.0 },
                LipinskiRule { descriptor: Descriptor::HBondDonors, threshold: 5.0 },
                LipinskiRule { descriptor: Descriptor::HBondAcceptors, threshold: 10.0 },
            ],
            max_violations: 1,
        }
    }
}

impl LipinskiRules {
    pub fn with_max_violations(mut self, max_violations: usize) -> Self {
        self.max_violations = max_violations;
        self
    }

    /// Replace the threshold of an existing rule, or add the rule.
    pub fn with_threshold(mut self, descriptor: Descriptor, threshold: f64) -> Self {
        match self.rules.iter_mut().find(|r| r.descriptor == descriptor) {
            Some(rule) => rule.threshold = threshold,
            None => self.rules.push(LipinskiRule { descriptor, threshold }),
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LipinskiViolation {
    pub descriptor: Descriptor,
    pub threshold: f64,
    pub observed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LipinskiVerdict {
    pub passes: bool,
    /// In rule order.
    pub violations: Vec<LipinskiViolation>,
}

impl LipinskiVerdict {
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn violates(&self, descriptor: Descriptor) -> bool {
        self.violations.iter().any(|v| v.descriptor == descriptor)
    }
}

pub fn evaluate_lipinski(descriptors: &DescriptorSet) -> LipinskiVerdict {
    evaluate_lipinski_with(descriptors, &LipinskiRules::default())
}

pub fn evaluate_lipinski_with(descriptors: &DescriptorSet, rules: &LipinskiRules) -> LipinskiVerdict {
    let violations: Vec<LipinskiViolation> = rules
        .rules
        .iter()
        .filter_map(|rule| {
            let observed = descriptors.get(rule.descriptor);
            (observed > rule.threshold).then_some(LipinskiViolation {
                descriptor: rule.descriptor,
                threshold: rule.threshold,
                observed,
            })
        })
        .collect();
    LipinskiVerdict {
        passes: violations.len() <= rules.max_violations,
        violations,
    }
}

/// Asymmetric double sigmoid, as used by Bickerton et al. for QED.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesirabilityCurve {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
    pub d_max: f64,
}

impl DesirabilityCurve {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64, d_max: f64) -> Self {
        Self { a, b, c, d, e, f, d_max }
    }

    pub fn desirability(&self, x: f64) -> f64 {
        let rise = 1.0 + (-(x - self.c + self.d / 2.0) / self.e).exp();
        let fall = 1.0 - 1.0 / (1.0 + (-(x - self.c - self.d / 2.0) / self.f).exp());
        (self.a + self.b / rise * fall) / self.d_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QedProperty {
    pub descriptor: Descriptor,
    pub curve: DesirabilityCurve,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QedParameters {
    pub properties: Vec<QedProperty>,
    /// Desirabilities below this are raised to it before the geometric mean.
    pub floor: f64,
}

impl Default for QedParameters {
    /// Bickerton's mean weights; the structural-alert term is replaced by a
    /// molar refractivity curve centred on 40..130.
    fn default() -> Self {
        use Descriptor::*;
        let property = |descriptor, curve, weight| QedProperty { descriptor, curve, weight };
        Self {
            properties: vec![
                property(
                    MolecularWeight,
                    DesirabilityCurve::new(2.817065973, 392.5754953, 290.7489764, 2.419764353, 49.22325677, 65.37051707, 104.9805561),
                    0.66,
                ),
                property(
                    LogP,
                    DesirabilityCurve::new(3.172690585, 137.8624751, 2.534937431, 4.581497897, 0.822739154, 0.576295591, 131.3186604),
                    0.46,
                ),
                property(
                    HBondAcceptors,
                    DesirabilityCurve::new(2.948620388, 160.4605972, 3.615294657, 4.435986202, 0.290141953, 1.300669958, 148.7763046),
                    0.05,
                ),
                property(
                    HBondDonors,
                    DesirabilityCurve::new(1.618662227, 1010.051101, 0.985094388, 0.000000001, 0.713820843, 0.920922555, 258.1632616),
                    0.61,
                ),
                property(
                    Tpsa,
                    DesirabilityCurve::new(1.876861559, 125.2232657, 62.90773554, 87.83366614, 12.01999824, 28.51324732, 104.5686167),
                    0.06,
                ),
                property(
                    RotatableBonds,
                    DesirabilityCurve::new(0.010000000, 272.4121427, 2.558379970, 1.566380819, 1.271567166, 2.758063707, 105.4420403),
                    0.65,
                ),
                property(
                    AromaticRings,
                    DesirabilityCurve::new(3.217788970, 957.7374108, 2.274627939, 0.000000001, 1.317690384, 0.375760881, 312.3372610),
                    0.48,
                ),
                property(
                    MolarRefractivity,
                    DesirabilityCurve::new(0.0, 1.0, 85.0, 90.0, 8.0, 8.0, 1.0),
                    0.30,
                ),
            ],
            floor: 1e-6,
        }
    }
}

impl QedParameters {
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn with_weight(mut self, descriptor: Descriptor, weight: f64) -> Self {
        for property in self.properties.iter_mut().filter(|p| p.descriptor == descriptor) {
            property.weight = weight;
        }
        self
    }
}

/// Quantitative estimate of drug-likeness, always within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct QedScore(f64);

impl QedScore {
    pub fn value(&self) -> f64 {
        self.0
    }
}

pub fn compute_qed(descriptors: &DescriptorSet) -> QedScore {
    compute_qed_with(descriptors, &QedParameters::default())
}

pub fn compute_qed_with(descriptors: &DescriptorSet, params: &QedParameters) -> QedScore {
    let floor = if params.floor.is_finite() && params.floor > 0.0 { params.floor } else { 1e-6 };
    let mut weighted_log = 0.0;
    let mut total_weight = 0.0;
    for property in &params.properties {
        let d = property.curve.desirability(descriptors.get(property.descriptor));
        let d = if d.is_finite() { d.max(floor) } else { floor };
        weighted_log += property.weight * d.ln();
        total_weight += property.weight;
    }
    if total_weight <= 0.0 {
        return QedScore(0.0);
    }
    let score = (weighted_log / total_weight).exp();
    let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
    trace!("qed {:.4}", score);
    QedScore(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compute_descriptors, parse_smiles};

    fn descriptors(smiles: &str) -> DescriptorSet {
        compute_descriptors(&parse_smiles(smiles).unwrap()).unwrap()
    }

    #[test]
    fn test_lipinski_aspirin() {
        let verdict = evaluate_lipinski(&descriptors("CC(=O)Oc1ccccc1C(=O)O"));
        assert!(verdict.passes);
        assert_eq!(verdict.violation_count(), 0);
    }

    #[test]
    fn test_lipinski_violations_are_ordered() {
        let mut d = descriptors("CCO");
        d.molecular_weight = 800.0;
        d.h_bond_acceptors = 12;
        let verdict = evaluate_lipinski(&d);
        assert!(!verdict.passes);
        let flagged: Vec<Descriptor> = verdict.violations.iter().map(|v| v.descriptor).collect();
        assert_eq!(flagged, vec![Descriptor::MolecularWeight, Descriptor::HBondAcceptors]);
        assert_eq!(verdict.violations[0].observed, 800.0);
        assert_eq!(verdict.violations[0].threshold, 500.0);
    }

    #[test]
    fn test_lipinski_monotonic_in_weight() {
        // One violation already (logP), so crossing the weight limit fails it.
        let mut base = descriptors("CCO");
        base.logp = 6.0;
        assert_eq!(evaluate_lipinski(&base).violation_count(), 1);

        let mut previous: Option<(f64, usize, bool)> = None;
        for weight in [100.0, 300.0, 499.9, 500.0, 500.1, 900.0] {
            let mut d = base.clone();
            d.molecular_weight = weight;
            let verdict = evaluate_lipinski(&d);
            let count = verdict.violation_count();
            if let Some((last_weight, last_count, last_passes)) = previous {
                assert!(count >= last_count, "{} -> {}", last_weight, weight);
                assert!(!(verdict.passes && !last_passes), "{} -> {}", last_weight, weight);
                if last_weight == 500.0 {
                    assert_eq!(count, last_count + 1);
                    assert!(last_passes && !verdict.passes);
                }
            }
            previous = Some((weight, count, verdict.passes));
        }
    }

    #[test]
    fn test_lipinski_configurable() {
        let d = descriptors("CCO");
        let rules = LipinskiRules::default()
            .with_threshold(Descriptor::MolecularWeight, 40.0)
            .with_max_violations(0);
        let verdict = evaluate_lipinski_with(&d, &rules);
        assert!(!verdict.passes);
        assert!(verdict.violates(Descriptor::MolecularWeight));
    }

    #[test]
    fn test_desirability_peaks_near_centre() {
        let mw = QedParameters::default().properties[0].curve;
        assert!(mw.desirability(300.0) > 0.9);
        assert!(mw.desirability(800.0) < 0.1);
    }

    #[test]
    fn test_qed_bounds_for_degenerate_input() {
        let mut d = descriptors("C");
        for value in [0.0, 1e6, -1e6] {
            d.molecular_weight = value;
            d.logp = value;
            d.tpsa = value;
            d.molar_refractivity = value;
            let qed = compute_qed(&d).value();
            assert!((0.0..=1.0).contains(&qed), "qed {} for {}", qed, value);
        }
        let zero = QedParameters::default().with_weight(Descriptor::MolecularWeight, 0.0);
        assert!((0.0..=1.0).contains(&compute_qed_with(&d, &zero).value()));
    }

    #[test]
    fn test_qed_deterministic_and_ordered() {
        let aspirin = descriptors("CC(=O)Oc1ccccc1C(=O)O");
        let a = compute_qed(&aspirin);
        let b = compute_qed(&aspirin);
        assert_eq!(a, b);
        assert!(a.value() > 0.3 && a.value() < 1.0);

        let methane = compute_qed(&descriptors("C"));
        assert!(methane.value() < a.value());
    }
}
