//! opa-query
//!
//! Command-line front end for querying decisions from a policy service.

use opa_policy_client::{init_logging, ClientConfig, HttpMethod, PolicyClient, ReqwestTransport};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

/// Query an Open Policy Agent server
#[derive(Parser, Debug)]
#[command(name = "opa-query")]
#[command(about = "Query policy decisions from an Open Policy Agent server")]
#[command(version)]
struct Args {
    /// Base URL of the policy service
    #[arg(long, env = "OPA_URL")]
    url: Option<String>,

    /// Data API version segment
    #[arg(long, env = "OPA_VERSION")]
    opa_version: Option<String>,

    /// HTTP method (GET or POST)
    #[arg(long, env = "OPA_METHOD")]
    method: Option<HttpMethod>,

    /// Configuration file path
    #[arg(short, long, env = "OPA_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the full response document
    Query(QueryArgs),
    /// Fail unless the decision equals the expected value
    Assert {
        #[command(flatten)]
        query: QueryArgs,
        /// Expected decision
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        expected: bool,
    },
    /// Print the boolean decision
    Evaluate(QueryArgs),
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Resource in dot or slash notation, e.g. `authz.allow`
    resource: String,

    /// Input document as JSON
    #[arg(short, long)]
    input: Option<String>,
}

impl QueryArgs {
    fn input(&self) -> Result<Option<Value>> {
        self.input
            .as_deref()
            .map(|raw| serde_json::from_str(raw).context("--input is not valid JSON"))
            .transpose()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    let config = build_config(&args)?;
    info!(
        url = %config.base_url(),
        version = %config.opa_version,
        method = %config.method,
        "opa-query v{}",
        opa_policy_client::VERSION
    );

    let transport = ReqwestTransport::new().context("failed to create HTTP transport")?;
    let client = PolicyClient::new(config, transport)?;

    match &args.command {
        Command::Query(query) => {
            let input = query.input()?;
            let response: Value = client.query(&query.resource, input.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Assert { query, expected } => {
            let input = query.input()?;
            client
                .assert_with(&query.resource, input.as_ref(), *expected)
                .await?;
            info!(resource = %query.resource, expected, "assertion holds");
        }
        Command::Evaluate(query) => {
            let input = query.input()?;
            let decision = client.evaluate(&query.resource, input.as_ref()).await?;
            println!("{}", decision);
        }
    }

    Ok(())
}

/// Assemble the client configuration from the file and flag overrides.
fn build_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match (&args.config, &args.url) {
        (Some(path), _) => ClientConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {:?}", path))?,
        (None, Some(url)) => ClientConfig::from_url(url.as_str()),
        (None, None) => anyhow::bail!("either --url or --config is required"),
    };

    if let (Some(_), Some(url)) = (&args.config, &args.url) {
        config.url = url.clone();
    }
    if let Some(version) = &args.opa_version {
        config.opa_version = version.clone();
    }
    if let Some(method) = args.method {
        config.method = method;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.request_options.timeout_ms = Some(timeout_ms);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_build_config_from_flags() {
        let args = Args::try_parse_from([
            "opa-query",
            "--url",
            "https://opa.test",
            "--opa-version",
            "v2",
            "--method",
            "get",
            "--timeout-ms",
            "300",
            "evaluate",
            "my.resource.allow",
        ])
        .unwrap();

        let config = build_config(&args).unwrap();
        assert_eq!(config.url, "https://opa.test");
        assert_eq!(config.opa_version, "v2");
        assert_eq!(config.method, HttpMethod::Get);
        assert_eq!(config.request_options.timeout_ms, Some(300));
    }

    #[test]
    fn test_assert_expected_flag() {
        let args = Args::try_parse_from([
            "opa-query",
            "--url",
            "https://opa.test",
            "assert",
            "my.resource.deny",
            "--expected",
            "false",
            "--input",
            r#"{"subject": {"id": 1}}"#,
        ])
        .unwrap();

        match args.command {
            Command::Assert { query, expected } => {
                assert!(!expected);
                assert_eq!(query.resource, "my.resource.deny");
                assert!(query.input().unwrap().is_some());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_input_json() {
        let query = QueryArgs {
            resource: "a.b".to_string(),
            input: Some("{oops".to_string()),
        };
        assert!(query.input().is_err());
    }
}
