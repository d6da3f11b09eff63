use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use kubeclient::client::{DEFAULT_URL, TIMEOUT_ENV, URL_ENV};
use kubeclient::{Client, Context, Deployment, Error};

/// Manage deployments on a remote orchestration service.
#[derive(Debug, Parser)]
#[command(name = "kubeclient", version)]
struct Cli {
    /// Base URL of the deployment service
    #[arg(long, env = URL_ENV, default_value = DEFAULT_URL)]
    url: String,

    /// Request deadline in milliseconds
    #[arg(long, env = TIMEOUT_ENV, default_value_t = 2500)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a deployment
    Create {
        #[arg(long)]
        image: String,
        #[arg(long, default_value_t = 1)]
        replicas: u32,
        /// Identifier to use; a random one is generated when omitted
        #[arg(long)]
        id: Option<Uuid>,
        /// Label as key=value, repeatable
        #[arg(long = "label", value_parser = parse_pair::<String>)]
        labels: Vec<(String, String)>,
        /// Port as name=number, repeatable, order is kept
        #[arg(long = "port", value_parser = parse_pair::<u16>)]
        ports: Vec<(String, u16)>,
    },
    /// Fetch a deployment by id
    Get { id: Uuid },
    /// Delete a deployment by id
    Delete { id: Uuid },
}

fn parse_pair<T>(raw: &str) -> Result<(String, T), String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let value = value.parse::<T>().map_err(|e| format!("{value:?}: {e}"))?;
    Ok((key.to_string(), value))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    debug!("{:?}", cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            if let Some(fields) = e.failed_fields() {
                eprintln!("failed fields: {}", fields.join(", "));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let client = Client::builder()
        .url(cli.url)
        .timeout(Duration::from_millis(cli.timeout_ms))
        .build()?;
    let ctx = Context::background();
    let deployments = client.deployments();

    match cli.command {
        Command::Create {
            image,
            replicas,
            id,
            labels,
            ports,
        } => {
            let mut deployment = Deployment::new(image, replicas);
            if let Some(id) = id {
                deployment.id = id;
            }
            deployment.labels.extend(labels);
            for (name, number) in ports {
                deployment = deployment.with_port(name, number);
            }
            let created = deployments.create(&ctx, &deployment).await?;
            println!("{}", render_json(&created)?);
        }
        Command::Get { id } => {
            let deployment = deployments.get(&ctx, id).await?;
            println!("{}", render_json(&deployment)?);
        }
        Command::Delete { id } => {
            deployments.delete(&ctx, id).await?;
            println!("deleted {id}");
        }
    }
    Ok(())
}

fn render_json(deployment: &Deployment) -> Result<String, Error> {
    serde_json::to_string_pretty(deployment).map_err(Error::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_create() {
        let cli = Cli::try_parse_from([
            "kubeclient",
            "--url",
            "http://localhost:8080",
            "create",
            "--image",
            "nginx",
            "--replicas",
            "3",
            "--port",
            "http=80",
            "--port",
            "https=443",
            "--label",
            "app=web",
        ])
        .unwrap();
        assert_eq!(cli.url, "http://localhost:8080");
        match cli.command {
            Command::Create {
                image,
                replicas,
                ports,
                labels,
                id,
            } => {
                assert_eq!(image, "nginx");
                assert_eq!(replicas, 3);
                assert_eq!(ports, vec![("http".to_string(), 80), ("https".to_string(), 443)]);
                assert_eq!(labels, vec![("app".to_string(), "web".to_string())]);
                assert!(id.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn bad_port_is_rejected() {
        let result = Cli::try_parse_from([
            "kubeclient",
            "create",
            "--image",
            "nginx",
            "--port",
            "http=eighty",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn render_json_is_the_wire_shape() {
        let deployment = Deployment::new("nginx", 2).with_port("http", 80);
        let json = render_json(&deployment).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["image"], "nginx");
        assert_eq!(value["replicas"], 2);
        assert_eq!(value["ports"][0]["port"], 80);
        assert!(json.contains('\n'));
    }

    #[test]
    fn get_requires_uuid() {
        assert!(Cli::try_parse_from(["kubeclient", "get", "not-a-uuid"]).is_err());
        let id = Uuid::nil().to_string();
        assert!(Cli::try_parse_from(["kubeclient", "get", id.as_str()]).is_ok());
    }
}
