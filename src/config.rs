use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::Level;

use crate::model::{ContainerSpec, TruckCatalog};
use crate::placement::{PlacementConfig, SnapMode};

// Configuration is read before the tracing subscriber exists, so problems are
// reported on stderr directly.

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planner: PlannerConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planner: PlannerConfig::from_env(),
            log: LogConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
    serve_docs: bool,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

    fn from_env() -> Self {
        let host_value =
            env_string("LOAD_PLANNER_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse LOAD_PLANNER_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match env_string("LOAD_PLANNER_API_PORT") {
            Some(raw) => parse_port(&raw).unwrap_or(Self::DEFAULT_PORT),
            None => Self::DEFAULT_PORT,
        };

        let serve_docs = env_string("LOAD_PLANNER_SERVE_DOCS")
            .and_then(|raw| parse_bool(&raw, "LOAD_PLANNER_SERVE_DOCS"))
            .unwrap_or(true);

        Self {
            bind_ip,
            display_host: effective_host,
            port,
            serve_docs,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether `/docs` and `/docs/openapi.json` are mounted.
    pub fn serve_docs(&self) -> bool {
        self.serve_docs
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration for capacity calculation and placement.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    default_truck: String,
    snap_mode: SnapMode,
}

impl PlannerConfig {
    const DEFAULT_TRUCK_VAR: &'static str = "LOAD_PLANNER_DEFAULT_TRUCK";
    const SNAP_MODE_VAR: &'static str = "LOAD_PLANNER_SNAP_MODE";

    fn from_env() -> Self {
        let default_truck = match env_string(Self::DEFAULT_TRUCK_VAR) {
            Some(key) if TruckCatalog::contains(&key) => key,
            Some(key) => {
                eprintln!(
                    "⚠️ {} names an unknown truck size ('{}'). Using {}.",
                    Self::DEFAULT_TRUCK_VAR,
                    key,
                    TruckCatalog::DEFAULT_KEY
                );
                TruckCatalog::DEFAULT_KEY.to_string()
            }
            None => TruckCatalog::DEFAULT_KEY.to_string(),
        };

        let snap_mode = match env_string(Self::SNAP_MODE_VAR) {
            Some(raw) => SnapMode::parse(&raw).unwrap_or_else(|| {
                eprintln!(
                    "⚠️ {} must be 'next-free' or 'nearest', got '{}'. Using {}.",
                    Self::SNAP_MODE_VAR,
                    raw,
                    SnapMode::default().as_str()
                );
                SnapMode::default()
            }),
            None => SnapMode::default(),
        };

        if snap_mode == SnapMode::Nearest {
            println!(
                "⚠️ Warning: Dropped items snap to the closest free cell ({} = {}).",
                Self::SNAP_MODE_VAR,
                snap_mode.as_str()
            );
        }

        Self {
            default_truck,
            snap_mode,
        }
    }

    /// Catalog key of the truck used when a request names none.
    pub fn default_truck(&self) -> &str {
        &self.default_truck
    }

    /// Container of the default truck.
    pub fn default_container(&self) -> ContainerSpec {
        TruckCatalog::lookup(&self.default_truck).unwrap_or_else(|_| {
            TruckCatalog::entries()[0].container
        })
    }

    /// Returns the configured PlacementConfig.
    pub fn placement_config(&self) -> PlacementConfig {
        PlacementConfig::builder().snap_mode(self.snap_mode).build()
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_truck: TruckCatalog::DEFAULT_KEY.to_string(),
            snap_mode: SnapMode::default(),
        }
    }
}

/// Configuration of the log output.
#[derive(Clone, Debug)]
pub struct LogConfig {
    level: Level,
}

impl LogConfig {
    const LEVEL_VAR: &'static str = "LOAD_PLANNER_LOG_LEVEL";

    fn from_env() -> Self {
        let level = match env_string(Self::LEVEL_VAR) {
            Some(raw) => raw.parse::<Level>().unwrap_or_else(|err| {
                eprintln!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::LEVEL_VAR,
                    raw,
                    err,
                    Level::INFO
                );
                Level::INFO
            }),
            None => Level::INFO,
        };
        Self { level }
    }

    /// Maximum level passed on to the subscriber.
    pub fn level(&self) -> Level {
        self.level
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            eprintln!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name, err
            );
            None
        }
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    match raw.parse::<u16>() {
        Ok(value) if value != 0 => Some(value),
        Ok(_) => {
            eprintln!("⚠️ LOAD_PLANNER_API_PORT must not be 0. Using default value.");
            None
        }
        Err(err) => {
            eprintln!(
                "⚠️ Could not parse LOAD_PLANNER_API_PORT ('{}'): {}. Using default value.",
                raw, err
            );
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            eprintln!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}
