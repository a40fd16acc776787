pub mod common;
pub mod health;
pub mod materials;
pub mod orders;
pub mod requisitions;

use crate::events::EventSender;
use crate::services::{monitor::MonitorSettings, MaterialService, MonitorService, P2PService};
use crate::store::StateManager;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub materials: Arc<MaterialService>,
    pub p2p: Arc<P2PService>,
    pub monitor: Arc<MonitorService>,
}

impl AppServices {
    /// Wires every service against one shared state manager.
    pub fn new(
        store: Arc<StateManager>,
        event_sender: Option<Arc<EventSender>>,
        monitor: MonitorSettings,
    ) -> Self {
        let materials = Arc::new(MaterialService::new(store.clone(), event_sender.clone()));
        let p2p = Arc::new(P2PService::new(
            store.clone(),
            materials.clone(),
            event_sender,
        ));
        let monitor = Arc::new(MonitorService::new(store, monitor));

        Self {
            materials,
            p2p,
            monitor,
        }
    }
}
