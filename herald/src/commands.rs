use crate::CliError;
use clap::Args;
use notifier::discovery::{self, Endpoint, Source};
use notifier::payload::{build_actions, normalize_users};
use notifier::{ClientError, Notifier};
use relay::model::{
    AutoClose, DEFAULT_AUTO_CLOSE_MS, FetchResponse, IngestRequest, NotificationType,
};
use serde_json::Value;
use url::Url;

/// Where to find the relay and how to authenticate against it.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Base URL of the Jupyter server. Discovered from the runtime directory
    /// or the environment when omitted.
    #[arg(long)]
    pub url: Option<String>,

    /// Auth token for remote servers (falls back to JUPYTERHUB_API_TOKEN,
    /// JPY_API_TOKEN or JUPYTER_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Print debug information
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Notification message
    #[arg(long, short)]
    pub message: String,

    /// Notification type
    #[arg(long = "type", short = 't', default_value_t = NotificationType::Info)]
    pub kind: NotificationType,

    /// Auto-close timeout in milliseconds; 0 shows it in the notification
    /// center only
    #[arg(long, default_value_t = DEFAULT_AUTO_CLOSE_MS)]
    pub auto_close: u64,

    /// Keep the notification until it is dismissed
    #[arg(long)]
    pub no_auto_close: bool,

    /// JSON data to attach, e.g. '{"key": "value"}'
    #[arg(long, value_parser = parse_json)]
    pub data: Option<Value>,

    /// Label of a dismiss button, or of the command button with --command
    #[arg(long)]
    pub action: Option<String>,

    /// Frontend command run by the action button
    #[arg(long)]
    pub command: Option<String>,

    /// JSON arguments passed to --command
    #[arg(long, value_parser = parse_json, requires = "command")]
    pub command_args: Option<Value>,

    /// Only deliver to these users (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub users: Option<Vec<String>>,
}

impl SendArgs {
    pub fn to_request(&self) -> IngestRequest {
        let auto_close = match self.no_auto_close {
            true => AutoClose::Never,
            false => AutoClose::After(self.auto_close),
        };

        IngestRequest {
            message: self.message.clone(),
            kind: Some(self.kind),
            auto_close: Some(auto_close),
            actions: build_actions(
                self.action.as_deref(),
                self.command.as_deref(),
                self.command_args.clone(),
            ),
            data: self.data.clone(),
            target_users: self.users.as_ref().map(normalize_users),
        }
    }
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))
}

pub async fn send(args: SendArgs) -> Result<(), CliError> {
    let (notifier, endpoint) = connect(&args.connect)?;
    let request = args.to_request();

    if args.connect.verbose {
        println!("Sending JSON payload:");
        println!("{}", serde_json::to_string_pretty(&request)?);
        println!();
    }

    let receipt = notifier
        .send(&request)
        .await
        .inspect_err(|e| report(e, &endpoint))?;
    println!("Notification sent: {}", receipt.notification_id);

    Ok(())
}

pub async fn fetch(args: ConnectArgs) -> Result<(), CliError> {
    let (notifier, endpoint) = connect(&args)?;

    let notifications = notifier.fetch().await.inspect_err(|e| report(e, &endpoint))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&FetchResponse { notifications })?
    );

    Ok(())
}

fn connect(args: &ConnectArgs) -> Result<(Notifier, Endpoint), CliError> {
    let endpoint = discovery::discover(args.url.as_deref(), discovery::process_env);
    let url = Url::parse(&endpoint.base_url).map_err(ClientError::from)?;
    let token = discovery::resolve_token(
        &url,
        args.token.as_deref(),
        endpoint.token.as_deref(),
        discovery::process_env,
    );

    if args.verbose {
        match &endpoint.source {
            Source::Explicit => {}
            Source::RuntimeFile(path) => println!("Found server in {}", path.display()),
            Source::Environment(var) => println!("Using server from ${var}"),
            Source::Default => println!("No server found, using {}", endpoint.base_url),
        }
        if discovery::is_loopback(&url) {
            println!("Target is localhost - skipping authentication");
        } else if token.is_some() {
            println!("Using authentication token");
        } else {
            println!("No token provided for remote host");
        }
        println!();
    }

    let notifier = Notifier::url(&endpoint.base_url, token)?;
    Ok((notifier, endpoint))
}

fn report(error: &ClientError, endpoint: &Endpoint) {
    match error {
        ClientError::Status { status, body } => {
            eprintln!(
                "HTTP Error {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
            eprintln!("Response: {body}");
        }
        e if e.is_connect() => {
            eprintln!("Is the relay running at {}?", endpoint.base_url);
        }
        _ => {}
    }
}
