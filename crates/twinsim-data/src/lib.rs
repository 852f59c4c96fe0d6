pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, ScenarioData, load_network, load_scenario, load_script, load_tuning};
