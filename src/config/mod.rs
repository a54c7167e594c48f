pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use args::{CliConfig, Command};

#[cfg(feature = "cli")]
mod args {
    use super::toml_config::TomlConfig;
    use crate::utils::error::Result;
    use clap::{Parser, Subcommand};
    use std::path::Path;

    pub const DEFAULT_CONFIG_FILE: &str = "dogmap.toml";

    #[derive(Debug, Clone, Parser)]
    #[command(name = "dogmap")]
    #[command(about = "Zip-code statistics and choropleth maps for dog licensing data")]
    pub struct CliConfig {
        /// Path to a TOML configuration file (defaults to ./dogmap.toml when present)
        #[arg(short, long, global = true)]
        pub config: Option<String>,

        /// Override source.dataset_path
        #[arg(long, global = true)]
        pub dataset: Option<String>,

        /// Override maps.boundaries_path
        #[arg(long, global = true)]
        pub boundaries: Option<String>,

        #[arg(short, long, global = true, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, global = true, help = "Log CPU and memory usage per phase")]
        pub monitor: bool,

        #[arg(long, global = true, help = "Emit logs as JSON lines")]
        pub log_json: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// Deduplicate the dataset and write the aggregated JSON files
        Preprocess,
        /// Render one choropleth page per popular breed and name
        Maps,
        /// Preprocess, then render maps
        Run,
        /// Bundle data and maps into a deployable static site
        Export {
            /// Also write a zip archive of the site
            #[arg(long)]
            archive: bool,
        },
        /// Serve the viewer and JSON API over HTTP
        Serve {
            #[arg(long)]
            listen: Option<String>,
        },
    }

    impl CliConfig {
        /// Loads the TOML file (or defaults) and applies command-line overrides.
        pub fn load_config(&self) -> Result<TomlConfig> {
            let mut config = match &self.config {
                Some(path) => TomlConfig::from_file(path)?,
                None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                    TomlConfig::from_file(DEFAULT_CONFIG_FILE)?
                }
                None => TomlConfig::default(),
            };
            self.apply_overrides(&mut config);
            Ok(config)
        }

        pub fn apply_overrides(&self, config: &mut TomlConfig) {
            if let Some(dataset) = &self.dataset {
                config.source.dataset_path = dataset.clone();
            }
            if let Some(boundaries) = &self.boundaries {
                config.maps.boundaries_path = boundaries.clone();
            }
            if self.monitor {
                config.monitoring.enabled = true;
            }
            match &self.command {
                Command::Export { archive: true } => config.output.archive = true,
                Command::Serve {
                    listen: Some(listen),
                } => config.server.listen = listen.clone(),
                _ => {}
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_overrides_apply_on_top_of_file_config() {
            let cli = CliConfig::parse_from([
                "dogmap",
                "--dataset",
                "dogs.csv",
                "--monitor",
                "serve",
                "--listen",
                "0.0.0.0:8000",
            ]);
            let mut config = TomlConfig::default();
            cli.apply_overrides(&mut config);

            assert_eq!(config.source.dataset_path, "dogs.csv");
            assert_eq!(config.server.listen, "0.0.0.0:8000");
            assert!(config.monitoring_enabled());
            assert!(!config.output.archive);
        }

        #[test]
        fn test_export_archive_flag() {
            let cli = CliConfig::parse_from(["dogmap", "export", "--archive"]);
            let mut config = TomlConfig::default();
            cli.apply_overrides(&mut config);
            assert!(config.output.archive);
        }
    }
}
