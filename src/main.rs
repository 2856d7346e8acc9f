use anyhow::Context;
use broute_rs::skstack::open_serial;
use broute_rs::util::hex::encode_hex_upper;
use broute_rs::{
    decode_frame_hex, init_logger, log_info, BrouteConfig, BrouteModule, Credentials, Orchestrator,
    PowerUsageLog,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "broute-cli")]
#[command(about = "Smart meter telemetry over the Wi-SUN B-route")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Serial device, overrides the configuration file
    #[arg(short, long, global = true)]
    device: Option<String>,
    #[arg(short, long, global = true)]
    baudrate: Option<u32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CredentialArgs {
    /// B-route authentication ID
    #[arg(long, env = "BROUTE_ID", hide_env_values = true)]
    id: String,
    /// B-route password
    #[arg(long, env = "BROUTE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and log measurements until interrupted
    Run {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Provision and scan for the meter, then print what was found
    Scan {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Decode an ECHONET Lite frame given in hex
    Decode {
        hex: String,
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<PathBuf>, device: Option<String>, baudrate: Option<u32>) -> anyhow::Result<BrouteConfig> {
    let mut config = match &path {
        Some(path) => BrouteConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BrouteConfig::default(),
    };
    if let Some(device) = device {
        config.device = device;
    }
    if let Some(baudrate) = baudrate {
        config.baudrate = baudrate;
    }
    config.validate()?;
    Ok(config)
}

fn credentials(args: CredentialArgs) -> anyhow::Result<Credentials> {
    Ok(Credentials::new(args.id, args.password)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let Cli {
        config,
        device,
        baudrate,
        command,
    } = Cli::parse();

    match command {
        Commands::Decode { hex, json } => {
            let (frame, measurements) = decode_frame_hex(&hex)?;
            if json {
                let out = serde_json::json!({ "frame": frame, "measurements": measurements });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!(
                    "EHD1 0x{:02X} EHD2 0x{:02X} TID {:04X}",
                    frame.protocol_type,
                    frame.format.to_byte(),
                    frame.transaction_id
                );
                if let Some(edata) = frame.edata() {
                    println!("SEOJ {} DEOJ {} ESV 0x{:02X}", edata.source, edata.dest, edata.service);
                }
                for p in frame.properties() {
                    println!(
                        "  EPC 0x{:02X} PDC {} EDT {}",
                        p.code(),
                        p.len(),
                        p.data().map(encode_hex_upper).unwrap_or_default()
                    );
                }
                for m in &measurements {
                    println!("{m}");
                }
            }
        }
        Commands::Scan { credentials: args } => {
            let config = load_config(config, device, baudrate)?;
            let mut module = BrouteModule::open(config, credentials(args)?)?;
            let result = module.scan().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            println!("meter address: {}", result.link_local_address());
        }
        Commands::Run { credentials: args } => {
            let config = load_config(config, device, baudrate)?;
            let mut orchestrator = Orchestrator::new(config, credentials(args)?, PowerUsageLog::new());
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Cannot listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            orchestrator
                .run_until(
                    |config: &BrouteConfig| open_serial(&config.device, config.baudrate),
                    shutdown,
                )
                .await
                .context("serial port unavailable")?;
            log_info(&format!(
                "Recorded {} responses",
                orchestrator.sink().recorded()
            ));
        }
    }

    Ok(())
}
