//! xiaoai-ctl: command-line client for a running xiaoai-relay.
//!
//! Sends one request to the relay's HTTP API and prints the JSON reply.
//! Exit status is 0 on a 2xx reply, 1 on any other reply, 2 if the relay
//! could not be reached.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

const DEFAULT_URL: &str = "http://127.0.0.1:8080";

#[derive(Parser, Debug)]
#[command(name = "xiaoai-ctl", about = "Control a running xiaoai-relay")]
struct Cli {
    /// Base URL of the relay
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Speak text on the speaker
    Say { text: String },
    /// Run a spoken directive, e.g. "关灯"
    Action { command: String },
    /// Start the relaxation scene
    Relax,
    /// Stop playback and interrupt the scene
    Stop,
    /// Show scene state and device variant
    Status,
    /// Read or replace the stored front-end config
    Config {
        #[command(subcommand)]
        op: ConfigCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    Get,
    /// Replace the config with a JSON document
    Set { json: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("xiaoai-ctl: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
    let resp = build_request(&client, &cli.url, cli.command)?.send().await?;

    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        eprintln!("xiaoai-ctl: relay answered {status}");
    }
    Ok(status.is_success())
}

fn build_request(client: &Client, base: &str, command: Cmd) -> Result<RequestBuilder, serde_json::Error> {
    let base = base.trim_end_matches('/');
    let request = match command {
        Cmd::Say { text } => client
            .post(format!("{base}/api/say"))
            .json(&json!({ "text": text })),
        Cmd::Action { command } => client
            .post(format!("{base}/api/action"))
            .json(&json!({ "command": command })),
        Cmd::Relax => client.post(format!("{base}/api/relax")),
        Cmd::Stop => client.post(format!("{base}/api/stop")),
        Cmd::Status => client.get(format!("{base}/api/status")),
        Cmd::Config { op: ConfigCmd::Get } => client.get(format!("{base}/api/config")),
        Cmd::Config {
            op: ConfigCmd::Set { json },
        } => {
            let value: Value = serde_json::from_str(&json)?;
            client.post(format!("{base}/api/config")).json(&value)
        }
    };
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(command: Cmd) -> reqwest::Request {
        build_request(&Client::new(), "http://relay.local:8080/", command)
            .expect("request")
            .build()
            .expect("build")
    }

    fn body_json(req: &reqwest::Request) -> Value {
        let bytes = req.body().and_then(|b| b.as_bytes()).expect("body");
        serde_json::from_slice(bytes).expect("json")
    }

    #[test]
    fn say_posts_text_body() {
        let req = built(Cmd::Say { text: "喝水".into() });
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "http://relay.local:8080/api/say");
        assert_eq!(body_json(&req), json!({ "text": "喝水" }));
    }

    #[test]
    fn action_posts_command_body() {
        let req = built(Cmd::Action { command: "关灯".into() });
        assert_eq!(req.url().path(), "/api/action");
        assert_eq!(body_json(&req), json!({ "command": "关灯" }));
    }

    #[test]
    fn status_and_config_get_are_gets() {
        assert_eq!(built(Cmd::Status).method(), reqwest::Method::GET);
        let req = built(Cmd::Config { op: ConfigCmd::Get });
        assert_eq!(req.method(), reqwest::Method::GET);
        assert_eq!(req.url().path(), "/api/config");
    }

    #[test]
    fn config_set_rejects_invalid_json() {
        let result = build_request(
            &Client::new(),
            DEFAULT_URL,
            Cmd::Config {
                op: ConfigCmd::Set { json: "{oops".into() },
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn config_set_forwards_document() {
        let req = built(Cmd::Config {
            op: ConfigCmd::Set {
                json: r#"{"sitLimit": 45}"#.into(),
            },
        });
        assert_eq!(body_json(&req), json!({ "sitLimit": 45 }));
    }
}
