//! Config namespace: YAML runtime settings.

mod settings;

pub use settings::{
    DecisionSettings, LbvizSettings, ResultsSettings, RunSettings, TopologySettings, UiSettings,
    load_settings, load_settings_from_paths, set_config_home_override, settings_paths,
};
