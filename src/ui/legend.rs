//! Legend reconciliation.
//!
//! Layers report the scales they encode with; the reconciler deduplicates
//! them and only hands out a new legend when the set actually changed, so a
//! viewport settle that rebuilds features does not redraw the legend.

use crate::prelude::HashMap;
use crate::styles::color::SerializableColor;
use crate::styles::scale::{Domain, Scale};
use log::{debug, warn};
use serde::Serialize;

/// Number of colours sampled along a linear ramp
const RAMP_SAMPLES: usize = 10;

/// Linear domains reaching this magnitude get exponent-formatted ticks
const EXPONENT_TICK_LIMIT: f64 = 1e9;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LegendEntry {
    Categorical {
        label: String,
        swatches: Vec<(String, SerializableColor)>,
        width: Option<String>,
    },
    Linear {
        label: String,
        domain: [f64; 2],
        ramp: Vec<SerializableColor>,
        exponent_ticks: bool,
        width: Option<String>,
    },
}

impl LegendEntry {
    fn from_scale(scale: &Scale) -> Self {
        match &scale.domain {
            Domain::Categorical(categories) => Self::Categorical {
                label: scale.label.clone(),
                swatches: categories
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (c.clone(), scale.scheme.ordinal(i)))
                    .collect(),
                width: scale.width.clone(),
            },
            Domain::Linear(domain) => Self::Linear {
                label: scale.label.clone(),
                domain: *domain,
                ramp: scale.scheme.sample(RAMP_SAMPLES),
                exponent_ticks: domain[0] <= -EXPONENT_TICK_LIMIT
                    || domain[1] >= EXPONENT_TICK_LIMIT,
                width: scale.width.clone(),
            },
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Categorical { label, .. } | Self::Linear { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendUpdate {
    /// Whether the legend has to be redrawn
    pub changed: bool,
    pub legend: Legend,
}

/// Keeps the last rendered scale set and diffs new ones against it
#[derive(Debug, Clone, Default)]
pub struct LegendReconciler {
    width: Option<String>,
    keys: Vec<String>,
    scales: Vec<Scale>,
    legend: Legend,
}

impl LegendReconciler {
    pub fn new(width: Option<String>) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    /// Deduplicates `active` by canonical key and compares the result with
    /// the previous call. On a key collision the later scale replaces the
    /// earlier one in its original position.
    pub fn reconcile(&mut self, active: &[Scale]) -> LegendUpdate {
        let mut keys: Vec<String> = Vec::new();
        let mut unique: Vec<Scale> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::default();

        for scale in active {
            let scale = match &self.width {
                Some(w) => scale.clone().with_width(Some(w.clone())),
                None => scale.clone(),
            };
            let key = match scale.canonical_key() {
                Ok(key) => key,
                Err(e) => {
                    warn!("dropping scale '{}' from legend: {e}", scale.label);
                    continue;
                }
            };
            match positions.get(&key) {
                Some(&i) => unique[i] = scale,
                None => {
                    positions.insert(key.clone(), unique.len());
                    keys.push(key);
                    unique.push(scale);
                }
            }
        }

        if keys == self.keys {
            return LegendUpdate {
                changed: false,
                legend: self.legend.clone(),
            };
        }

        debug!("legend changed: {} scales", unique.len());
        self.legend = Legend {
            entries: unique.iter().map(LegendEntry::from_scale).collect(),
        };
        self.keys = keys;
        self.scales = unique;
        LegendUpdate {
            changed: true,
            legend: self.legend.clone(),
        }
    }

    /// Scales of the last rendered legend
    pub fn scales(&self) -> &[Scale] {
        &self.scales
    }

    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    /// Forgets the rendered set so the next reconcile always reports a change
    pub fn reset(&mut self) {
        self.keys.clear();
        self.scales.clear();
        self.legend = Legend::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::color::ColorScheme;
    use crate::styles::scale::ScaleKind;

    fn linear(label: &str, domain: [f64; 2]) -> Scale {
        Scale {
            kind: ScaleKind::Linear,
            scheme: ColorScheme::Viridis,
            domain: Domain::Linear(domain),
            label: label.into(),
            width: None,
        }
    }

    fn categorical(label: &str) -> Scale {
        Scale {
            kind: ScaleKind::Categorical,
            scheme: ColorScheme::Observable10,
            domain: Domain::Categorical(vec!["a".into(), "b".into()]),
            label: label.into(),
            width: None,
        }
    }

    #[test]
    fn test_identical_sets_do_not_redraw() {
        let mut reconciler = LegendReconciler::default();
        let first = reconciler.reconcile(&[linear("v", [0.0, 1.0]), categorical("c")]);
        assert!(first.changed);
        assert_eq!(first.legend.len(), 2);

        // Fresh clones, same serialization
        let again = reconciler.reconcile(&[linear("v", [0.0, 1.0]), categorical("c")]);
        assert!(!again.changed);
        assert_eq!(again.legend, first.legend);

        let moved = reconciler.reconcile(&[linear("v", [0.0, 2.0]), categorical("c")]);
        assert!(moved.changed);
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut reconciler = LegendReconciler::default();
        let update = reconciler.reconcile(&[
            categorical("c"),
            linear("v", [0.0, 1.0]),
            categorical("c"),
        ]);
        assert_eq!(update.legend.len(), 2);
        assert_eq!(update.legend.entries[0].label(), "c");
        assert_eq!(reconciler.scales().len(), 2);
    }

    #[test]
    fn test_width_is_stamped_and_exponent_ticks() {
        let mut reconciler = LegendReconciler::new(Some("250px".into()));
        let update = reconciler.reconcile(&[linear("big", [0.0, 2e9])]);
        match &update.legend.entries[0] {
            LegendEntry::Linear {
                exponent_ticks,
                width,
                ramp,
                ..
            } => {
                assert!(*exponent_ticks);
                assert_eq!(width.as_deref(), Some("250px"));
                assert_eq!(ramp.len(), RAMP_SAMPLES);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn test_empty_set_after_layers_go_away() {
        let mut reconciler = LegendReconciler::default();
        assert!(!reconciler.reconcile(&[]).changed);
        assert!(reconciler.reconcile(&[categorical("c")]).changed);
        let cleared = reconciler.reconcile(&[]);
        assert!(cleared.changed);
        assert!(cleared.legend.is_empty());
    }
}
