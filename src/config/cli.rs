use crate::config::toml_config::AppConfig;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "car-listings")]
#[command(about = "Car listing service: browse, search, create, edit and delete car listings")]
pub struct ServeArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "car-listings.toml")]
    pub config: String,

    /// Override the listening port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the SQLite database path
    #[arg(long)]
    pub database: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// 應用命令列覆蓋設定
    ///
    /// Returns a description of each applied override so it can be logged
    /// once the logger is running.
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Vec<String> {
        let mut applied = Vec::new();
        if let Some(port) = self.port {
            config.server.port = port;
            applied.push(format!("Port overridden to: {}", port));
        }
        if let Some(database) = &self.database {
            config.database.path = database.clone();
            applied.push(format!("Database path overridden to: {}", database));
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_to_config() {
        let args = ServeArgs::parse_from(["car-listings", "--port", "9090", "--database", "/tmp/x.db"]);
        let mut config = AppConfig::default();
        let applied = args.apply_overrides(&mut config);

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.path, "/tmp/x.db");
        assert_eq!(args.config, "car-listings.toml");
        assert_eq!(
            applied,
            vec!["Port overridden to: 9090", "Database path overridden to: /tmp/x.db"]
        );

        let args = ServeArgs::parse_from(["car-listings"]);
        assert!(args.apply_overrides(&mut config).is_empty());
        assert_eq!(config.server.port, 9090);
    }
}
