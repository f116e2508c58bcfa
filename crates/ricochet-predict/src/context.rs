//! Read-only context passed to every predictor call.

use ricochet_core::Kinematics;
use ricochet_space::BoundaryCondition;

use crate::properties::PropertyTable;

/// Shared, read-only state a predictor may consult.
///
/// Built by the driver for each call. Predictors never see the calendar
/// or the spatial index; everything they may depend on is here or in
/// the particles they are handed.
#[derive(Clone, Copy)]
pub struct PredictContext<'a> {
    boundary: &'a dyn BoundaryCondition,
    properties: &'a PropertyTable,
    kinematics: &'a Kinematics,
    system_time: f64,
}

impl<'a> PredictContext<'a> {
    /// Construct a context.
    ///
    /// Typically called by the engine. Tests build one directly.
    pub fn new(
        boundary: &'a dyn BoundaryCondition,
        properties: &'a PropertyTable,
        kinematics: &'a Kinematics,
        system_time: f64,
    ) -> Self {
        Self {
            boundary,
            properties,
            kinematics,
            system_time,
        }
    }

    /// Boundary condition shared with the spatial index.
    pub fn boundary(&self) -> &'a dyn BoundaryCondition {
        self.boundary
    }

    /// Species properties.
    pub fn properties(&self) -> &'a PropertyTable {
        self.properties
    }

    /// Free-streaming law.
    pub fn kinematics(&self) -> &'a Kinematics {
        self.kinematics
    }

    /// Absolute simulation time.
    pub fn system_time(&self) -> f64 {
        self.system_time
    }
}

impl std::fmt::Debug for PredictContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictContext")
            .field("boundary", &self.boundary)
            .field("species", &self.properties.len())
            .field("kinematics", self.kinematics)
            .field("system_time", &self.system_time)
            .finish()
    }
}
