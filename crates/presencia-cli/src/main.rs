use anyhow::Result;
use clap::{Parser, Subcommand};

#[zbus::proxy(
    interface = "org.presencia.Kiosk1",
    default_service = "org.presencia.Kiosk1",
    default_path = "/org/presencia/Kiosk1"
)]
trait Kiosk {
    async fn status(&self) -> zbus::Result<String>;
    async fn enroll(&self, dni: &str, name: &str) -> zbus::Result<String>;
    async fn remove_user(&self, dni: &str) -> zbus::Result<bool>;
    async fn list_users(&self) -> zbus::Result<String>;
    async fn record_attendance(&self, dni: &str, kind: &str) -> zbus::Result<i64>;
    async fn flag_false_positive(&self, dni: &str) -> zbus::Result<()>;
    async fn amend_attendance(
        &self,
        id: i64,
        kind: &str,
        timestamp_ms: i64,
        observation: &str,
        modified_by: &str,
    ) -> zbus::Result<()>;
    async fn recent_attendance(&self, window_secs: u64) -> zbus::Result<String>;
    async fn sync_now(&self) -> zbus::Result<String>;
    async fn set_sync_config(&self, server_url: &str, api_key: &str, enabled: bool) -> zbus::Result<()>;
    async fn get_sync_config(&self) -> zbus::Result<String>;
    async fn device_status(&self) -> zbus::Result<String>;
    async fn test_connection(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "presencia", about = "Presencia attendance kiosk CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// Enroll a new identity from the kiosk camera
    Enroll {
        /// External document number (unique natural key)
        dni: String,
        /// Display name
        name: String,
    },
    /// List enrolled identities
    List,
    /// Remove an identity (attendance history goes with it)
    Remove {
        dni: String,
    },
    /// Record a manual attendance entry
    Record {
        dni: String,
        /// Entrada, Salida, "Entrada Descanso", "Salida Descanso" or Falta
        kind: String,
    },
    /// The subject rejected a confirmed match
    Reject {
        dni: String,
    },
    /// Correct an existing attendance row
    Amend {
        /// Attendance row id
        id: i64,
        kind: String,
        /// Corrected event time, milliseconds since epoch
        timestamp_ms: i64,
        #[arg(long, default_value = "")]
        observation: String,
        #[arg(long, default_value = "operator")]
        by: String,
    },
    /// Show recent attendance activity
    Recent {
        /// Window in seconds
        #[arg(short, long, default_value_t = 3600)]
        window: u64,
    },
    /// Run a full sync cycle now
    Sync,
    /// Show or change the sync configuration
    Config {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Poll the server-side device moderation status
    Device,
    /// Probe the configured server (5 second timeout)
    TestConnection,
    /// List local capture devices
    Cameras,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Camera diagnostics bypass the daemon entirely.
    if let Commands::Cameras = cli.command {
        let devices = presencia_hw::Camera::list_devices();
        if devices.is_empty() {
            println!("no capture devices found");
        }
        for device in devices {
            println!("{}\t{}\t({})", device.path, device.name, device.driver);
        }
        return Ok(());
    }

    let connection = zbus::Connection::session().await?;
    let kiosk = KioskProxy::new(&connection).await?;

    match cli.command {
        Commands::Status => print_json(&kiosk.status().await?),
        Commands::Enroll { dni, name } => {
            println!("Look at the camera...");
            print_json(&kiosk.enroll(&dni, &name).await?);
        }
        Commands::List => print_json(&kiosk.list_users().await?),
        Commands::Remove { dni } => {
            if kiosk.remove_user(&dni).await? {
                println!("removed {dni}");
            } else {
                println!("no identity with dni {dni}");
            }
        }
        Commands::Record { dni, kind } => {
            let id = kiosk.record_attendance(&dni, &kind).await?;
            println!("recorded attendance #{id}");
        }
        Commands::Reject { dni } => {
            kiosk.flag_false_positive(&dni).await?;
            println!("false positive noted for {dni}");
        }
        Commands::Amend { id, kind, timestamp_ms, observation, by } => {
            kiosk.amend_attendance(id, &kind, timestamp_ms, &observation, &by).await?;
            println!("attendance #{id} amended");
        }
        Commands::Recent { window } => print_json(&kiosk.recent_attendance(window).await?),
        Commands::Sync => print_json(&kiosk.sync_now().await?),
        Commands::Config { server: None, api_key: None, enabled: None } => {
            print_json(&kiosk.get_sync_config().await?);
        }
        Commands::Config { server, api_key, enabled } => {
            // Partial updates merge over the current configuration.
            let current: serde_json::Value = serde_json::from_str(&kiosk.get_sync_config().await?)?;
            let server = server
                .unwrap_or_else(|| current["serverUrl"].as_str().unwrap_or_default().to_string());
            let enabled = enabled.unwrap_or_else(|| current["enabled"].as_bool().unwrap_or(false));
            kiosk
                .set_sync_config(&server, api_key.as_deref().unwrap_or(""), enabled)
                .await?;
            println!("sync config updated");
        }
        Commands::Device => println!("{}", kiosk.device_status().await?),
        Commands::TestConnection => println!("{}", kiosk.test_connection().await?),
        Commands::Cameras => unreachable!("handled above"),
    }

    Ok(())
}

fn print_json(raw: &str) {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{raw}"),
        },
        Err(_) => println!("{raw}"),
    }
}
