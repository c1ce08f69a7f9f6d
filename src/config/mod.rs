mod settings;

pub use settings::{
    Settings, SettingsError, TomlSettings, ENV_AUTO_FUZZY_MATCH, ENV_BLOCK_RUN,
    ENV_FUZZY_MATCHERS, ENV_RECORD_MODE, ENV_WAIT,
};
