pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod locate;
pub mod platform;
pub mod runner;
pub mod setup;
pub mod ui;
pub mod version;

pub use cli::{Cli, Commands};
pub use config::FetchConfig;
pub use error::FetchError;
pub use platform::Platform;
pub use runner::Runner;
pub use setup::{Installation, Setup, SetupOutcome};
pub use ui::{ConsoleUi, Phase, SilentUi, Ui, UiApp};
