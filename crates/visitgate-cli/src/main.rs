use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use visitgate_core::{TemplateValue, VerificationMethod, VerifyRequest};

// `#[zbus::proxy]` generates `GateProxy` for the daemon's interface.
#[zbus::proxy(
    interface = "org.visitgate.Gate1",
    default_service = "org.visitgate.Gate1",
    default_path = "/org/visitgate/Gate1"
)]
trait Gate {
    async fn verify(&self, request: &str) -> zbus::Result<String>;
    async fn register(&self, visitor: &str) -> zbus::Result<String>;
    async fn approve(&self, id: &str) -> zbus::Result<String>;
    async fn reject(&self, id: &str) -> zbus::Result<String>;
    async fn update_visitor(&self, id: &str, update: &str) -> zbus::Result<String>;
    async fn remove_visitor(&self, id: &str) -> zbus::Result<bool>;
    async fn get_visitor(&self, id: &str) -> zbus::Result<String>;
    async fn list_visitors(&self) -> zbus::Result<String>;
    async fn record_entry(&self, request: &str) -> zbus::Result<String>;
    async fn record_exit(&self, request: &str) -> zbus::Result<String>;
    async fn logs(&self, status: &str, date: &str, page: u32, limit: u32) -> zbus::Result<String>;
    async fn visitor_logs(&self, visitor_id: &str) -> zbus::Result<String>;
    async fn stats(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "visitgate", about = "visitgate visitor management CLI")]
struct Cli {
    /// Talk to the daemon on the system bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How to identify the visitor.
#[derive(Args, Debug, Default)]
struct ProbeArgs {
    /// QR token printed on the visitor pass
    #[arg(long)]
    qr: Option<String>,
    /// JSON file holding a face descriptor array
    #[arg(long, value_name = "FILE")]
    face: Option<PathBuf>,
    /// JSON file holding a thumbprint template array
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,
    /// File holding a base64 thumbprint image
    #[arg(long, value_name = "FILE")]
    image: Option<PathBuf>,
    /// Force a method: qr, face or thumbprint
    #[arg(long, value_parser = parse_method)]
    method: Option<VerificationMethod>,
    /// Visitor id (manual entry/exit)
    #[arg(long)]
    id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a visitor
    Verify(ProbeArgs),
    /// Register a visitor from a JSON form
    Register {
        /// JSON file with name, email, phone, purpose, personToMeet, ...
        #[arg(long)]
        json: PathBuf,
    },
    /// Edit a visitor's details
    Update {
        id: String,
        /// JSON file with the fields to change
        #[arg(long)]
        json: PathBuf,
    },
    /// Approve a pending visitor
    Approve { id: String },
    /// Reject a visitor
    Reject { id: String },
    /// Remove a visitor and their logs
    Remove { id: String },
    /// Show one visitor, or all visitors
    Show { id: Option<String> },
    /// Record an entry
    Entry(ProbeArgs),
    /// Record an exit
    Exit(ProbeArgs),
    /// List entry logs
    Logs {
        /// inside or exited
        #[arg(long)]
        status: Option<String>,
        /// YYYY-MM-DD (UTC)
        #[arg(long)]
        date: Option<String>,
        /// Only logs for this visitor
        #[arg(long)]
        visitor: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show entry statistics
    Stats,
    /// Show daemon status
    Status,
}

fn parse_method(s: &str) -> Result<VerificationMethod, String> {
    VerificationMethod::parse(s).ok_or_else(|| format!("unknown method {s:?} (expected qr, face or thumbprint)"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

impl ProbeArgs {
    fn to_request(&self) -> Result<VerifyRequest> {
        let face_descriptor: Vec<f32> = match &self.face {
            Some(path) => read_json(path)?,
            None => Vec::new(),
        };
        let thumbprint_template: Vec<TemplateValue> = match &self.template {
            Some(path) => read_json(path)?,
            None => Vec::new(),
        };
        let thumbprint = match &self.image {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?
                    .trim()
                    .to_string(),
            ),
            None => None,
        };

        let request = VerifyRequest {
            qr_code: self.qr.clone(),
            visitor_id: self.id.clone(),
            face_descriptor,
            thumbprint_template,
            thumbprint,
            method: self.method,
        };
        if request.probe().is_none() && request.visitor_id.is_none() {
            bail!("nothing to verify: pass --qr, --face, --template, --image or --id");
        }
        Ok(request)
    }
}

fn print_json(reply: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(reply).context("daemon sent invalid JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("connecting to D-Bus")?;
    let proxy = GateProxy::new(&conn).await?;
    tracing::debug!(system = cli.system, "connected to visitgated");

    match cli.command {
        Commands::Verify(probe) => {
            let request = serde_json::to_string(&probe.to_request()?)?;
            print_json(&proxy.verify(&request).await?)?;
        }
        Commands::Register { json } => {
            let form: serde_json::Value = read_json(&json)?;
            print_json(&proxy.register(&form.to_string()).await?)?;
        }
        Commands::Update { id, json } => {
            let update: serde_json::Value = read_json(&json)?;
            print_json(&proxy.update_visitor(&id, &update.to_string()).await?)?;
        }
        Commands::Approve { id } => print_json(&proxy.approve(&id).await?)?,
        Commands::Reject { id } => print_json(&proxy.reject(&id).await?)?,
        Commands::Remove { id } => {
            if proxy.remove_visitor(&id).await? {
                println!("Visitor removed");
            } else {
                println!("No visitor with id {id}");
            }
        }
        Commands::Show { id: Some(id) } => print_json(&proxy.get_visitor(&id).await?)?,
        Commands::Show { id: None } => print_json(&proxy.list_visitors().await?)?,
        Commands::Entry(probe) => {
            let request = serde_json::to_string(&probe.to_request()?)?;
            print_json(&proxy.record_entry(&request).await?)?;
        }
        Commands::Exit(probe) => {
            let request = serde_json::to_string(&probe.to_request()?)?;
            print_json(&proxy.record_exit(&request).await?)?;
        }
        Commands::Logs {
            visitor: Some(visitor),
            ..
        } => print_json(&proxy.visitor_logs(&visitor).await?)?,
        Commands::Logs {
            status,
            date,
            visitor: None,
            page,
            limit,
        } => {
            let reply = proxy
                .logs(
                    status.as_deref().unwrap_or(""),
                    date.as_deref().unwrap_or(""),
                    page,
                    limit,
                )
                .await?;
            print_json(&reply)?;
        }
        Commands::Stats => print_json(&proxy.stats().await?)?,
        Commands::Status => print_json(&proxy.status().await?)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn qr_flag_builds_qr_request() {
        let args = ProbeArgs { qr: Some("abc123".into()), ..Default::default() };
        let request = args.to_request().unwrap();
        assert_eq!(request.qr_code.as_deref(), Some("abc123"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "qrCode": "abc123" })
        );
    }

    #[test]
    fn face_file_is_loaded() {
        let path = std::env::temp_dir().join(format!("visitgate-face-{}.json", std::process::id()));
        std::fs::write(&path, "[0.5, 0.25]").unwrap();
        let args = ProbeArgs { face: Some(path.clone()), ..Default::default() };
        let request = args.to_request().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(request.face_descriptor, vec![0.5, 0.25]);
    }

    #[test]
    fn empty_probe_is_an_error() {
        assert!(ProbeArgs::default().to_request().is_err());
    }

    #[test]
    fn method_flag_parses_aliases() {
        assert_eq!(parse_method("fingerprint"), Ok(VerificationMethod::Fingerprint));
        assert!(parse_method("iris").is_err());
    }

    #[test]
    fn parses_update() {
        let cli = Cli::try_parse_from(["visitgate", "update", "v1", "--json", "edit.json"]).unwrap();
        match cli.command {
            Commands::Update { id, json } => {
                assert_eq!(id, "v1");
                assert_eq!(json, PathBuf::from("edit.json"));
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn parses_entry_with_id() {
        let cli = Cli::try_parse_from(["visitgate", "entry", "--id", "v1"]).unwrap();
        match cli.command {
            Commands::Entry(args) => assert_eq!(args.id.as_deref(), Some("v1")),
            _ => panic!("expected entry"),
        }
    }
}
