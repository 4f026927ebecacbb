//! Parameter registry implementation
//!
//! [`Parameters`] is an insertion-ordered mapping from name to [`Parameter`].
//! The iteration order is the index convention of every global parameter
//! vector in the crate: element `i` of [`Parameters::values`] belongs to the
//! `i`-th name of [`Parameters::names`].

use crate::error::{FitError, Result};
use crate::parameters::parameter::Parameter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// An ordered collection of named parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RegistryEntries")]
pub struct Parameters {
    /// Parameters in registry order
    entries: Vec<(String, Parameter)>,

    /// Name to position lookup, rebuilt after deserialization
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Serialized form of [`Parameters`]: the entries without the lookup
#[derive(Deserialize)]
struct RegistryEntries {
    entries: Vec<(String, Parameter)>,
}

impl From<RegistryEntries> for Parameters {
    fn from(serialized: RegistryEntries) -> Self {
        let mut params = Parameters {
            entries: serialized.entries,
            index: HashMap::new(),
        };
        params.rebuild_index();
        params
    }
}

impl PartialEq for Parameters {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Parameters {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, or replace the one stored under `name`
    ///
    /// A replaced parameter keeps its position in the registry order.
    ///
    /// # Examples
    ///
    /// ```
    /// use fdfit_rs::parameters::{Parameter, Parameters};
    ///
    /// let mut params = Parameters::new();
    /// params.insert("Lp", Parameter::new(40.0));
    /// params.insert("Lc", Parameter::new(16.0));
    /// params.insert("Lp", Parameter::new(50.0));
    ///
    /// assert_eq!(params.names(), vec!["Lp", "Lc"]);
    /// assert_eq!(params.values().to_vec(), vec![50.0, 16.0]);
    /// ```
    pub fn insert(&mut self, name: impl Into<String>, param: Parameter) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = param,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, param));
            }
        }
    }

    /// Rebuild the registry for a new ordered name set
    ///
    /// Existing parameters are preserved by name (value, bounds and flags
    /// survive). Names that are new take `defaults[i]`, or
    /// [`Parameter::default`] when that slot is empty. Parameters whose names
    /// are not listed are dropped.
    ///
    /// # Errors
    ///
    /// [`FitError::ShapeMismatch`] when fewer defaults than names are given.
    pub fn set_parameters<S: AsRef<str>>(
        &mut self,
        names: &[S],
        defaults: &[Option<Parameter>],
    ) -> Result<()> {
        if defaults.len() < names.len() {
            return Err(FitError::shape(
                "parameter defaults",
                names.len(),
                defaults.len(),
            ));
        }

        let mut previous: HashMap<String, Parameter> = self.entries.drain(..).collect();
        self.index.clear();

        for (name, default) in names.iter().zip(defaults) {
            let name = name.as_ref();
            if self.index.contains_key(name) {
                continue;
            }
            let param = previous
                .remove(name)
                .or_else(|| default.clone())
                .unwrap_or_default();
            self.insert(name, param);
        }

        if !previous.is_empty() {
            log::debug!("Dropped {} parameters from registry", previous.len());
        }

        Ok(())
    }

    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Get a mutable reference to a parameter by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Current value of a parameter
    ///
    /// # Errors
    ///
    /// [`FitError::UnknownParameter`] if no parameter is stored under `name`.
    pub fn value(&self, name: &str) -> Result<f64> {
        self.get(name)
            .map(Parameter::value)
            .ok_or_else(|| FitError::UnknownParameter(name.to_string()))
    }

    /// Assign the value of a parameter by name
    ///
    /// Only the value changes; bounds and the free flag are kept.
    ///
    /// # Errors
    ///
    /// [`FitError::UnknownParameter`] if no parameter is stored under `name`.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        let param = self
            .get_mut(name)
            .ok_or_else(|| FitError::UnknownParameter(name.to_string()))?;
        param.set_value(value);
        Ok(())
    }

    /// Position of `name` in registry order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in registry order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Iterate over `(name, parameter)` pairs in registry order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(name, param)| (name.as_str(), param))
    }

    /// Iterate mutably over `(name, parameter)` pairs in registry order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Parameter)> {
        self.entries
            .iter_mut()
            .map(|(name, param)| (name.as_str(), param))
    }

    /// Values in registry order
    pub fn values(&self) -> ndarray::Array1<f64> {
        self.entries.iter().map(|(_, p)| p.value()).collect()
    }

    /// Free flags in registry order
    pub fn vary_mask(&self) -> Vec<bool> {
        self.entries.iter().map(|(_, p)| p.vary()).collect()
    }

    /// Lower bounds in registry order
    pub fn lower_bounds(&self) -> ndarray::Array1<f64> {
        self.entries.iter().map(|(_, p)| p.lower_bound()).collect()
    }

    /// Upper bounds in registry order
    pub fn upper_bounds(&self) -> ndarray::Array1<f64> {
        self.entries.iter().map(|(_, p)| p.upper_bound()).collect()
    }

    /// Number of free parameters
    pub fn n_free(&self) -> usize {
        self.entries.iter().filter(|(_, p)| p.vary()).count()
    }

    /// Restore every parameter to its initial value
    pub fn reset(&mut self) {
        for (_, param) in self.entries.iter_mut() {
            param.reset();
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>14} {:>12} {:>12} {:>12} {:>6}",
            "Name", "Value", "Stderr", "Min", "Max", "Fitted"
        )?;
        for (name, param) in self.iter() {
            let stderr = param
                .stderr()
                .map(|s| format!("{:.4e}", s))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<16} {:>14.6e} {:>12} {:>12} {:>12} {:>6}",
                name,
                param.value(),
                stderr,
                param.lower_bound(),
                param.upper_bound(),
                param.vary()
            )?;
        }
        Ok(())
    }
}

impl Parameters {
    /// Save parameters to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Save parameters to a JSON string
    ///
    /// Infinite bounds are written as `null`.
    pub fn to_json(&self) -> Result<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json)
    }

    /// Load parameters from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Load parameters from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
