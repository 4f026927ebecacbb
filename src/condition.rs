//! Grouping of data sets by transformation signature.
//!
//! Data sets whose transformations are identical (same free names and the
//! same constants, in base parameter order) share one [`Condition`], so their
//! local parameter vector is assembled once per evaluation.

use crate::data::FitData;
use crate::error::{FitError, Result};
use crate::transformation::Transformation;
use ndarray::{Array1, Array2, ArrayViewMut2};
use std::collections::HashMap;

/// One slot of a transformation signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Free(String),
    Fixed(u64),
}

impl From<&Transformation> for SlotKey {
    fn from(transformation: &Transformation) -> Self {
        match transformation {
            Transformation::Free(name) => SlotKey::Free(name.clone()),
            // -0.0 and 0.0 are the same constant
            Transformation::Fixed(value) => SlotKey::Fixed((value + 0.0).to_bits()),
        }
    }
}

/// A unique transformation signature and the index map it implies
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Human readable signature, slot values joined with `|`
    signature: String,

    /// Per local slot: does it read from the global vector?
    is_external: Vec<bool>,

    /// Constants for fixed slots, 0 for free ones
    local_values: Vec<f64>,

    /// Global vector position of every free slot, in slot order
    global_indices: Vec<usize>,
}

impl Condition {
    fn from_transformations(
        transformations: &[(String, Transformation)],
        global_lookup: &HashMap<&str, usize>,
    ) -> Result<Self> {
        let n = transformations.len();
        let mut is_external = Vec::with_capacity(n);
        let mut local_values = Vec::with_capacity(n);
        let mut global_indices = Vec::new();

        for (base, transformation) in transformations {
            match transformation {
                Transformation::Free(name) => {
                    let index = global_lookup.get(name.as_str()).ok_or_else(|| {
                        FitError::IncompatibleModel(format!(
                            "parameter '{}' (for '{}') is not in the global parameter set",
                            name, base
                        ))
                    })?;
                    is_external.push(true);
                    local_values.push(0.0);
                    global_indices.push(*index);
                }
                Transformation::Fixed(value) => {
                    is_external.push(false);
                    local_values.push(*value);
                }
            }
        }

        Ok(Self {
            signature: signature(transformations),
            is_external,
            local_values,
            global_indices,
        })
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn is_external(&self) -> &[bool] {
        &self.is_external
    }

    pub fn local_values(&self) -> &[f64] {
        &self.local_values
    }

    pub fn global_indices(&self) -> &[usize] {
        &self.global_indices
    }

    /// Number of local parameter slots
    pub fn n_local(&self) -> usize {
        self.is_external.len()
    }

    /// Assemble the local parameter vector from a global one
    pub fn localize(&self, global: &Array1<f64>) -> Vec<f64> {
        let mut local = self.local_values.clone();
        let free_slots = self
            .is_external
            .iter()
            .enumerate()
            .filter(|(_, &external)| external)
            .map(|(slot, _)| slot);
        for (slot, &g) in free_slots.zip(&self.global_indices) {
            local[slot] = global[g];
        }
        local
    }

    /// Scatter-add `scale` times a local Jacobian into global columns
    ///
    /// `local` has shape `(n_local, n_points)`; `out` has shape
    /// `(n_points, n_global)`. Rows of fixed slots are ignored. Two free
    /// slots reading the same global parameter both contribute.
    pub fn scatter_jacobian(&self, local: &Array2<f64>, scale: f64, out: &mut ArrayViewMut2<f64>) {
        let free_rows = self
            .is_external
            .iter()
            .enumerate()
            .filter(|(_, &external)| external)
            .map(|(slot, _)| slot);
        for (slot, &g) in free_rows.zip(&self.global_indices) {
            let mut column = out.column_mut(g);
            column.scaled_add(scale, &local.row(slot));
        }
    }
}

fn signature(transformations: &[(String, Transformation)]) -> String {
    transformations
        .iter()
        .map(|(_, t)| t.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

/// Conditions and, per condition, the indices of the data sets it covers
pub type ConditionSet = (Vec<Condition>, Vec<Vec<usize>>);

/// Deduplicate data sets into conditions
///
/// Conditions appear in first-seen order; `data_link[c]` lists, in original
/// order, the data sets sharing condition `c`.
///
/// # Errors
///
/// [`FitError::IncompatibleModel`] when a data set's transformation keys are
/// not exactly `base_names` (same names, same order), or when it reads a free
/// parameter absent from `global_names`.
pub fn build_conditions<S: AsRef<str>, T: AsRef<str>>(
    data: &[FitData],
    global_names: &[S],
    base_names: &[T],
) -> Result<ConditionSet> {
    let global_lookup: HashMap<&str, usize> = global_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_ref(), i))
        .collect();

    let mut conditions = Vec::new();
    let mut data_link: Vec<Vec<usize>> = Vec::new();
    let mut seen: HashMap<Vec<SlotKey>, usize> = HashMap::new();

    for (i, item) in data.iter().enumerate() {
        let transformations = item.transformations();
        let keys_match = transformations.len() == base_names.len()
            && transformations
                .iter()
                .zip(base_names)
                .all(|((key, _), base)| key == base.as_ref());
        if !keys_match {
            return Err(FitError::IncompatibleModel(format!(
                "transformations of data set '{}' do not cover the model parameters exactly",
                item.name
            )));
        }

        let key: Vec<SlotKey> = transformations.iter().map(|(_, t)| t.into()).collect();
        match seen.get(&key) {
            Some(&c) => data_link[c].push(i),
            None => {
                let condition = Condition::from_transformations(transformations, &global_lookup)?;
                seen.insert(key, conditions.len());
                conditions.push(condition);
                data_link.push(vec![i]);
            }
        }
    }

    log::debug!(
        "Built {} conditions for {} data sets",
        conditions.len(),
        data.len()
    );

    Ok((conditions, data_link))
}
