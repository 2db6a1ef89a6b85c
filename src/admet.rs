//! Heuristic ADMET labelling from declarative threshold tables.
//!
//! These labels are rules of thumb over a handful of descriptors. They are
//! not validated pharmacological predictions and should only be used to
//! rank or flag candidates for closer study.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use lazy_static::lazy_static;
use thiserror::Error;

use crate::{Descriptor, DescriptorSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdmetLabel {
    Low,
    Moderate,
    High,
    Fast,
    Slow,
}

impl Display for AdmetLabel {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let s = match self {
            AdmetLabel::Low => "Low",
            AdmetLabel::Moderate => "Moderate",
            AdmetLabel::High => "High",
            AdmetLabel::Fast => "Fast",
            AdmetLabel::Slow => "Slow",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleTableError {
    #[error("category {category}: label {label} is not one of its allowed labels")]
    LabelNotAllowed { category: String, label: AdmetLabel },
    #[error("category {0} has no allowed labels")]
    NoAllowedLabels(String),
    #[error("category {0} appears more than once")]
    DuplicateCategory(String),
    #[error("category {category}: rule {index} has no conditions")]
    EmptyRule { category: String, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub descriptor: Descriptor,
    pub comparison: Comparison,
    pub value: f64,
}

impl Condition {
    pub fn holds(&self, descriptors: &DescriptorSet) -> bool {
        let x = descriptors.get(self.descriptor);
        match self.comparison {
            Comparison::Less => x < self.value,
            Comparison::LessOrEqual => x <= self.value,
            Comparison::Greater => x > self.value,
            Comparison::GreaterOrEqual => x >= self.value,
        }
    }
}

pub fn lt(descriptor: Descriptor, value: f64) -> Condition {
    Condition { descriptor, comparison: Comparison::Less, value }
}

pub fn le(descriptor: Descriptor, value: f64) -> Condition {
    Condition { descriptor, comparison: Comparison::LessOrEqual, value }
}

pub fn gt(descriptor: Descriptor, value: f64) -> Condition {
    Condition { descriptor, comparison: Comparison::Greater, value }
}

pub fn ge(descriptor: Descriptor, value: f64) -> Condition {
    Condition { descriptor, comparison: Comparison::GreaterOrEqual, value }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub label: AdmetLabel,
    pub mode: MatchMode,
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn all(label: AdmetLabel, conditions: Vec<Condition>) -> Self {
        Self { label, mode: MatchMode::All, conditions }
    }

    pub fn any(label: AdmetLabel, conditions: Vec<Condition>) -> Self {
        Self { label, mode: MatchMode::Any, conditions }
    }

    pub fn matches(&self, descriptors: &DescriptorSet) -> bool {
        match self.mode {
            MatchMode::All => self.conditions.iter().all(|c| c.holds(descriptors)),
            MatchMode::Any => self.conditions.iter().any(|c| c.holds(descriptors)),
        }
    }
}

/// One labelled property. Rules are tried in order; the first match wins and
/// `fallback` covers everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub allowed: Vec<AdmetLabel>,
    pub rules: Vec<Rule>,
    pub fallback: AdmetLabel,
}

impl Category {
    pub fn new(name: impl Into<String>, allowed: &[AdmetLabel], rules: Vec<Rule>, fallback: AdmetLabel) -> Self {
        Self {
            name: name.into(),
            allowed: allowed.to_vec(),
            rules,
            fallback,
        }
    }

    pub fn label(&self, descriptors: &DescriptorSet) -> AdmetLabel {
        self.rules
            .iter()
            .find(|rule| rule.matches(descriptors))
            .map(|rule| rule.label)
            .unwrap_or(self.fallback)
    }

    fn validate(&self) -> Result<(), RuleTableError> {
        if self.allowed.is_empty() {
            return Err(RuleTableError::NoAllowedLabels(self.name.clone()));
        }
        let labels = self.rules.iter().map(|r| r.label).chain(std::iter::once(self.fallback));
        for label in labels {
            if !self.allowed.contains(&label) {
                return Err(RuleTableError::LabelNotAllowed {
                    category: self.name.clone(),
                    label,
                });
            }
        }
        if let Some(index) = self.rules.iter().position(|r| r.conditions.is_empty()) {
            return Err(RuleTableError::EmptyRule {
                category: self.name.clone(),
                index,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdmetRuleTable {
    categories: Vec<Category>,
}

const LMH: &[AdmetLabel] = &[AdmetLabel::Low, AdmetLabel::Moderate, AdmetLabel::High];
const FMS: &[AdmetLabel] = &[AdmetLabel::Fast, AdmetLabel::Moderate, AdmetLabel::Slow];

impl Default for AdmetRuleTable {
    fn default() -> Self {
        use AdmetLabel::*;
        use Descriptor::*;
        Self {
            categories: vec![
                Category::new(
                    "oral_absorption",
                    LMH,
                    vec![
                        Rule::any(Low, vec![gt(MolecularWeight, 600.0), gt(RotatableBonds, 10.0)]),
                        Rule::any(Low, vec![lt(LogP, 0.0), gt(Tpsa, 140.0)]),
                        Rule::all(Moderate, vec![gt(LogP, 5.0)]),
                    ],
                    High,
                ),
                Category::new(
                    "cns_penetration",
                    LMH,
                    vec![
                        Rule::all(
                            High,
                            vec![lt(Tpsa, 90.0), lt(MolecularWeight, 450.0), ge(LogP, 1.0), le(LogP, 4.0)],
                        ),
                        Rule::all(
                            Moderate,
                            vec![lt(Tpsa, 120.0), lt(MolecularWeight, 500.0), ge(LogP, 0.0), le(LogP, 5.0)],
                        ),
                    ],
                    Low,
                ),
                Category::new(
                    "toxicity_risk",
                    LMH,
                    vec![
                        Rule::any(High, vec![gt(LogP, 5.0), gt(MolecularWeight, 600.0)]),
                        Rule::any(Moderate, vec![gt(HBondDonors, 5.0), gt(HBondAcceptors, 10.0)]),
                    ],
                    Low,
                ),
                Category::new(
                    "clearance",
                    FMS,
                    vec![
                        Rule::all(Fast, vec![lt(LogP, 2.0), lt(MolecularWeight, 350.0)]),
                        Rule::all(Slow, vec![gt(LogP, 4.0)]),
                    ],
                    Moderate,
                ),
                Category::new(
                    "metabolic_liability",
                    LMH,
                    vec![
                        Rule::all(High, vec![gt(LogP, 5.0)]),
                        Rule::any(Moderate, vec![gt(LogP, 3.0), gt(RotatableBonds, 7.0)]),
                    ],
                    Low,
                ),
            ],
        }
    }
}

lazy_static! {
    static ref DEFAULT_TABLE: AdmetRuleTable = AdmetRuleTable::default();
}

impl AdmetRuleTable {
    pub fn new(categories: Vec<Category>) -> Result<Self, RuleTableError> {
        let mut names = BTreeSet::new();
        for category in &categories {
            if !names.insert(category.name.as_str()) {
                return Err(RuleTableError::DuplicateCategory(category.name.clone()));
            }
            category.validate()?;
        }
        Ok(Self { categories })
    }

    /// Add a category, or replace the one with the same name.
    pub fn with_category(mut self, category: Category) -> Result<Self, RuleTableError> {
        category.validate()?;
        match self.categories.iter_mut().find(|c| c.name == category.name) {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
        Ok(self)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// One heuristic label per category, in table order.
    pub fn label(&self, descriptors: &DescriptorSet) -> AdmetLabelSet {
        AdmetLabelSet {
            labels: self
                .categories
                .iter()
                .map(|c| (c.name.clone(), c.label(descriptors)))
                .collect(),
        }
    }
}

/// Heuristic labels keyed by category, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmetLabelSet {
    labels: Vec<(String, AdmetLabel)>,
}

impl AdmetLabelSet {
    pub fn get(&self, category: &str) -> Option<AdmetLabel> {
        self.labels
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, label)| *label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AdmetLabel)> {
        self.labels.iter().map(|(name, label)| (name.as_str(), *label))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Label with the built-in table.
pub fn label_admet(descriptors: &DescriptorSet) -> AdmetLabelSet {
    DEFAULT_TABLE.label(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compute_descriptors, parse_smiles};

    fn with_values(mw: f64, logp: f64, tpsa: f64, rotatable: usize, hbd: usize, hba: usize) -> DescriptorSet {
        let mut d = compute_descriptors(&parse_smiles("CCO").unwrap()).unwrap();
        d.molecular_weight = mw;
        d.logp = logp;
        d.tpsa = tpsa;
        d.rotatable_bonds = rotatable;
        d.h_bond_donors = hbd;
        d.h_bond_acceptors = hba;
        d
    }

    #[test]
    fn test_default_categories() {
        let labels = label_admet(&with_values(300.0, 2.5, 60.0, 4, 1, 3));
        let names: Vec<&str> = labels.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["oral_absorption", "cns_penetration", "toxicity_risk", "clearance", "metabolic_liability"]
        );
        assert_eq!(labels.get("oral_absorption"), Some(AdmetLabel::High));
        assert_eq!(labels.get("cns_penetration"), Some(AdmetLabel::High));
        assert_eq!(labels.get("toxicity_risk"), Some(AdmetLabel::Low));
        assert_eq!(labels.get("clearance"), Some(AdmetLabel::Moderate));
        assert_eq!(labels.get("metabolic_liability"), Some(AdmetLabel::Low));
    }

    #[test]
    fn test_lipophilic_compound() {
        let labels = label_admet(&with_values(356.5, 6.0, 35.5, 6, 0, 3));
        assert_eq!(labels.get("oral_absorption"), Some(AdmetLabel::Moderate));
        assert_eq!(labels.get("cns_penetration"), Some(AdmetLabel::Low));
        assert_eq!(labels.get("toxicity_risk"), Some(AdmetLabel::High));
        assert_eq!(labels.get("clearance"), Some(AdmetLabel::Slow));
        assert_eq!(labels.get("metabolic_liability"), Some(AdmetLabel::High));
    }

    #[test]
    fn test_rule_order_and_fallback() {
        // Large and polar: the first oral rule wins.
        let labels = label_admet(&with_values(700.0, -1.0, 200.0, 12, 6, 12));
        assert_eq!(labels.get("oral_absorption"), Some(AdmetLabel::Low));
        assert_eq!(labels.get("toxicity_risk"), Some(AdmetLabel::High));
        assert_eq!(labels.get("clearance"), Some(AdmetLabel::Moderate));
        assert_eq!(labels.get("metabolic_liability"), Some(AdmetLabel::Moderate));

        let small = label_admet(&with_values(200.0, 1.0, 30.0, 2, 1, 2));
        assert_eq!(small.get("clearance"), Some(AdmetLabel::Fast));
        assert_eq!(small.get("unknown"), None);
    }

    #[test]
    fn test_cns_boundaries_inclusive() {
        let at_four = label_admet(&with_values(300.0, 4.0, 60.0, 3, 1, 3));
        assert_eq!(at_four.get("cns_penetration"), Some(AdmetLabel::High));
        let above = label_admet(&with_values(300.0, 4.5, 60.0, 3, 1, 3));
        assert_eq!(above.get("cns_penetration"), Some(AdmetLabel::Moderate));
    }

    #[test]
    fn test_table_validation() {
        let bad = Category::new(
            "clearance",
            FMS,
            vec![Rule::all(AdmetLabel::High, vec![gt(Descriptor::LogP, 4.0)])],
            AdmetLabel::Moderate,
        );
        assert_eq!(
            AdmetRuleTable::new(vec![bad.clone()]).unwrap_err(),
            RuleTableError::LabelNotAllowed {
                category: "clearance".to_string(),
                label: AdmetLabel::High
            }
        );
        assert!(AdmetRuleTable::default().with_category(bad).is_err());

        let good = Category::new("solubility", LMH, vec![], AdmetLabel::Moderate);
        assert_eq!(
            AdmetRuleTable::new(vec![good.clone(), good.clone()]).unwrap_err(),
            RuleTableError::DuplicateCategory("solubility".to_string())
        );
        let table = AdmetRuleTable::default().with_category(good).unwrap();
        assert_eq!(table.categories().len(), 6);

        let empty = Category::new(
            "half_life",
            LMH,
            vec![Rule::any(AdmetLabel::Low, vec![])],
            AdmetLabel::Moderate,
        );
        assert!(matches!(
            AdmetRuleTable::new(vec![empty]),
            Err(RuleTableError::EmptyRule { index: 0, .. })
        ));
    }
}
