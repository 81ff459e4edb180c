use std::net::IpAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;

use helio_control_lib::control_interface::lightshow::run_lightshow;
use helio_control_lib::control_interface::{Device, TCP_PORT};
use helio_control_lib::util::discovery::{DeviceInfo, Discovery};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "helio_control",
    about = "Discovers and controls Heliospectra LED grow lights",
    version
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Subcommand for operations that require device communication
    #[clap(name = "device-call")]
    DeviceCall {
        /// Sets the IP address of the fixture
        #[clap(long)]
        ip: IpAddr,

        /// Sets the HTTP port of the fixture
        #[clap(long, default_value_t = TCP_PORT)]
        port: u16,

        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Searches the local network for fixtures
    #[clap(name = "discover")]
    Discover {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,

        /// Search timeout in milliseconds
        #[clap(short = 't', long = "timeout", default_value_t = 4000)]
        timeout: u64,
    },
    /// Discovers fixtures and runs the lightshow on the first one found
    #[clap(name = "demo")]
    Demo {
        /// Search timeout in milliseconds
        #[clap(short = 't', long = "timeout", default_value_t = 4000)]
        timeout: u64,
    },
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    /// Prints the full diagnostic snapshot.
    #[clap(name = "diagnostic")]
    Diagnostic,
    /// Prints the short status snapshot.
    #[clap(name = "status")]
    Status,
    /// Sets the intensity of every channel, in wavelength list order.
    #[clap(name = "set-intensities")]
    SetIntensities {
        /// One value per channel, e.g. `0,100,0,50`
        #[clap(value_delimiter = ',', required = true)]
        intensities: Vec<u32>,
    },
    /// Fades each channel up and down in turn.
    #[clap(name = "lightshow")]
    Lightshow,
}

/// Time allowed for fetching the diagnostic before the demo starts.
const DEMO_DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(1);

fn print<T: Serialize + std::fmt::Debug>(value: &T, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Plaintext => println!("{:#?}", value),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

async fn handle_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Discover { output, timeout } => {
            let devices = Discovery::find_devices(Duration::from_millis(timeout))
                .await
                .context("Discovery failed")?;
            match output {
                OutputFormat::Plaintext => Discovery::pretty_print_devices(&devices),
                _ => print(&devices, output)?,
            }
        }
        Commands::DeviceCall {
            ip,
            port,
            output,
            action,
        } => {
            let device = Device::new(ip, None).with_port(port);
            match action {
                DeviceAction::Diagnostic => {
                    let diag = device
                        .diagnostic()
                        .await
                        .context("Failed to fetch diagnostic")?;
                    print(&diag, output)?;
                }
                DeviceAction::Status => {
                    let status = device.status().await.context("Failed to fetch status")?;
                    print(&status, output)?;
                }
                DeviceAction::SetIntensities { intensities } => {
                    device
                        .set_intensities(&intensities)
                        .await
                        .context("Failed to set intensities")?;
                    println!("Intensities set: {:?}", intensities);
                }
                DeviceAction::Lightshow => {
                    let diag = device
                        .diagnostic()
                        .await
                        .context("Failed to fetch diagnostic")?;
                    run_lightshow(&device, diag.wavelengths.len()).await?;
                }
            }
        }
        Commands::Demo { timeout } => {
            let devices = Discovery::find_devices(Duration::from_millis(timeout))
                .await
                .context("Discovery failed")?;

            println!("Got devices from scan:");
            for device in &devices {
                println!("{}", device);
            }

            let first = devices.first().ok_or_else(|| {
                anyhow!("No fixtures found. If devices are missing, try increasing the search timeout.")
            })?;
            demo_device(first).await?;
        }
    }

    Ok(())
}

async fn demo_device(info: &DeviceInfo) -> Result<()> {
    let device = Device::from_device_info(info, None)?;

    let diag = tokio::time::timeout(DEMO_DIAGNOSTIC_TIMEOUT, device.diagnostic())
        .await
        .context("Timed out fetching diagnostic")??;
    println!("diagnostic data: {:#?}", diag);

    info!(
        "Running lightshow on {} across {} channels",
        device.address(),
        diag.wavelengths.len()
    );
    run_lightshow(&device, diag.wavelengths.len()).await?;
    Ok(())
}
