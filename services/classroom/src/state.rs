//! Shared Application State

use classroom_core::{
    agent::Agent,
    gateway::Gateway,
    orchestrator::{DialogTimings, Orchestrator},
    persona::{ClassroomAgent, Personas},
};
use std::sync::Arc;

/// Created once at startup and passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub personas: Arc<Personas>,
    pub timings: DialogTimings,
}

impl AppState {
    /// Builds a fresh dialog whose agent talks through the shared gateway.
    pub fn new_orchestrator(&self) -> Orchestrator {
        let gateway = self.gateway.clone();
        let personas = self.personas.clone();
        Orchestrator::new(
            move || -> Arc<dyn Agent> {
                Arc::new(ClassroomAgent::new(gateway.clone(), (*personas).clone()))
            },
            self.timings.clone(),
        )
    }
}
