//! Per-species properties consulted by predictors.

use indexmap::IndexMap;

use ricochet_core::{PredictError, SpeciesId};

use crate::error::RegistryError;

/// Static properties of one species.
#[derive(Clone, Debug, PartialEq)]
pub struct Species {
    /// Mass of every particle of this species.
    pub mass: f64,
}

/// Species registry. `SpeciesId(n)` is the n-th registered species.
#[derive(Clone, Debug, Default)]
pub struct PropertyTable {
    species: IndexMap<String, Species>,
}

impl PropertyTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with a single species of the given mass.
    pub fn single(name: &str, mass: f64) -> Result<Self, RegistryError> {
        let mut table = Self::new();
        table.add_species(name, mass)?;
        Ok(table)
    }

    /// Register a species and return its id.
    pub fn add_species(&mut self, name: &str, mass: f64) -> Result<SpeciesId, RegistryError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(RegistryError::InvalidMass {
                name: name.to_string(),
                mass,
            });
        }
        if self.species.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                table: "species",
                name: name.to_string(),
            });
        }
        let id = u32::try_from(self.species.len())
            .map_err(|_| RegistryError::TableFull { table: "species" })?;
        self.species.insert(name.to_string(), Species { mass });
        Ok(SpeciesId(id))
    }

    /// Number of registered species.
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// `true` if no species is registered.
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// `true` if `id` names a registered species.
    pub fn contains(&self, id: SpeciesId) -> bool {
        (id.0 as usize) < self.species.len()
    }

    /// Look up a species by id.
    pub fn get(&self, id: SpeciesId) -> Result<&Species, PredictError> {
        self.species
            .get_index(id.0 as usize)
            .map(|(_, s)| s)
            .ok_or(PredictError::UnknownSpecies { species: id })
    }

    /// Look up a species id by name.
    pub fn id(&self, name: &str) -> Option<SpeciesId> {
        self.species
            .get_index_of(name)
            .map(|i| SpeciesId(i as u32))
    }

    /// Name of a species.
    pub fn name(&self, id: SpeciesId) -> Option<&str> {
        self.species.get_index(id.0 as usize).map(|(n, _)| n.as_str())
    }

    /// Mass of a species.
    pub fn mass(&self, id: SpeciesId) -> Result<f64, PredictError> {
        self.get(id).map(|s| s.mass)
    }
}
