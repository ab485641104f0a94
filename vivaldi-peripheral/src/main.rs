use std::sync::Arc;

use vivaldi_gatt::advertisement::LEGACY_PAYLOAD_MAX;
use vivaldi_peripheral::profile;
use vivaldi_peripheral::{
    BackendError, ConfigError, DeviceBackend, HttpBackend, PeripheralConfig, ProfileKind, Timeout,
};

#[derive(clap::Parser)]
#[command(name = "vivaldi-peripheral")]
#[command(about = "Vivaldi S1 BLE peripheral")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: Overrides,
}

/// Settings that take precedence over `config.json`
#[derive(clap::Args)]
struct Overrides {
    /// GATT profile to expose
    #[arg(long, global = true, value_enum)]
    profile: Option<ProfileKind>,

    /// Device-control API base URL
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Backend timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Advertised local name
    #[arg(long, global = true)]
    local_name: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut PeripheralConfig) {
        if let Some(profile) = self.profile {
            config.profile = profile;
        }
        if let Some(url) = self.backend_url {
            config.backend_url = url;
        }
        if let Some(ms) = self.timeout_ms {
            config.backend_timeout_ms = ms;
        }
        if let Some(name) = self.local_name {
            config.local_name = name;
        }
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Print the GetManagedObjects snapshot as JSON
    Snapshot,
    /// Print the advertisement properties and its AD bytes
    Advertisement,
    /// Query the device-control backend
    State,
    /// Write the default config to the vivaldi home
    InitConfig {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli: Cli = clap::Parser::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let home = vivaldi_peripheral::vivaldi_home()?;
    let load = |overrides: Overrides| -> Result<PeripheralConfig, ConfigError> {
        let mut config = PeripheralConfig::load_or_create(&home)?;
        overrides.apply(&mut config);
        Ok(config)
    };

    match cli.command {
        Commands::InitConfig { force } => {
            let path = PeripheralConfig::path(&home);
            if path.exists() && !force {
                println!("config already exists at {}", path.display());
                return Ok(());
            }
            PeripheralConfig::default().save(&home)?;
            println!("wrote {}", path.display());
        }
        Commands::Snapshot => {
            let config = load(cli.overrides)?;
            let app = profile::build_application(config.profile, backend(&config)?)?;
            println!("{}", serde_json::to_string_pretty(&app.managed_objects())?);
        }
        Commands::Advertisement => {
            let config = load(cli.overrides)?;
            let ad = profile::test_advertisement(0, &config.local_name)?;
            println!("{}", serde_json::to_string_pretty(&ad.properties())?);
            let bytes = ad.encode()?;
            println!("ad bytes ({}): {}", bytes.len(), data_encoding::HEXLOWER.encode(&bytes));
            if bytes.len() > LEGACY_PAYLOAD_MAX {
                println!(
                    "exceeds the {LEGACY_PAYLOAD_MAX} byte legacy limit; needs extended advertising"
                );
            }
        }
        Commands::State => {
            let config = load(cli.overrides)?;
            let state = backend(&config)?.device_state().await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(())
}

fn backend(config: &PeripheralConfig) -> Result<Arc<dyn DeviceBackend>, BackendError> {
    Ok(Arc::new(Timeout::new(
        HttpBackend::new(&config.backend_url)?,
        config.backend_timeout(),
    )))
}
