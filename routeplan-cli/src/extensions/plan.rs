//! Builds the initial plan from a list of stops.

#[cfg(test)]
#[path = "../../tests/unit/extensions/plan_test.rs"]
mod plan_test;

use routeplan_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};

/// A planning input: a depot and the stops to distribute.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    /// A depot where every route starts.
    pub origin: Coordinate,
    /// Stops to plan.
    pub stops: Vec<Stop>,
}

/// A planned route.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRoute {
    /// Route key as displayed to operator.
    pub key: String,
    /// Ordered stops.
    pub stops: Vec<Stop>,
}

/// A planning output.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    /// Planned routes.
    pub routes: Vec<PlannedRoute>,
    /// Stops which do not fit into any route.
    pub unassigned: Vec<Stop>,
    /// Stops without usable coordinates.
    pub needs_correction: Vec<Stop>,
}

/// Reads planning input and distributes its stops into routes.
pub fn plan_stops<R: Read>(reader: BufReader<R>, config: &Config, environment: &Environment) -> GenericResult<PlanOutput> {
    let input: PlanInput = serde_json::from_reader(reader)
        .map_err(|err| GenericError::from(format!("cannot deserialize plan input: '{err}'")))?;

    let plan = plan_routes(input.origin, input.stops, &config.clustering_limits(), environment);
    let registry = RouteRegistry::from_plan(&plan);

    Ok(PlanOutput {
        routes: registry
            .routes()
            .map(|route| PlannedRoute { key: route.key.to_string(), stops: route.stops.clone() })
            .collect(),
        unassigned: registry.unassigned().to_vec(),
        needs_correction: plan.needs_correction,
    })
}

/// Writes plan output as json.
pub fn write_plan<W: Write>(writer: BufWriter<W>, output: &PlanOutput) -> GenericResult<()> {
    serde_json::to_writer_pretty(writer, output).map_err(|err| format!("cannot write plan: '{err}'").into())
}
