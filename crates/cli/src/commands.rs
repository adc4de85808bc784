//! CLI commands

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand};
use pesa_http::{
    ClientError, ContactMessage, PesaClient, ProfileUpdate, Registration, TransactionFilter,
    TransactionKind, TransferRequest,
};
use pesa_session::{AuthenticationState, Credentials, FileStorage, SessionManager};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{CliConfig, SESSION_FILE};

pub const LOGIN_HINT: &str = "Not logged in. Please log in with `pesa login --username <name>`.";

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (prefer the PESA_PASSWORD environment variable)
        #[arg(short, long, env = "PESA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// End the stored session
    Logout,

    /// Show whether a session is stored
    Status,

    /// Create an account
    Register(RegisterArgs),

    /// Message support
    Contact(ContactArgs),

    #[command(flatten)]
    Account(AccountCommands),
}

/// Commands that need a logged-in session
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Show your profile
    Profile,

    /// Change profile fields
    UpdateProfile(ProfileArgs),

    /// Show wallet balance
    Wallet,

    /// Show wallet history
    History,

    /// Set the 4-digit wallet PIN
    SetPin {
        #[arg(long, env = "PESA_PIN", hide_env_values = true)]
        pin: String,
    },

    /// Deposit through an M-Pesa STK push
    Mpesa {
        /// Phone number to prompt, e.g. 2547XXXXXXXX
        #[arg(long)]
        phone: String,

        /// Whole shillings
        #[arg(long)]
        amount: u64,
    },

    /// Send money to another user
    Send {
        #[arg(long)]
        recipient: String,

        #[arg(long)]
        amount: Decimal,

        #[arg(long, env = "PESA_PIN", hide_env_values = true)]
        pin: String,
    },

    /// List transactions
    Transactions(TransactionArgs),
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "PESA_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    id_number: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    address: String,
    /// YYYY-MM-DD
    #[arg(long)]
    date_of_birth: String,
    #[arg(long, default_value = "")]
    bio: String,
}

#[derive(Args)]
pub struct ProfileArgs {
    #[arg(long)]
    id_number: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    date_of_birth: Option<String>,
    #[arg(long)]
    bio: Option<String>,
}

#[derive(Args)]
pub struct TransactionArgs {
    /// YYYY-MM-DD
    #[arg(long)]
    start_date: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    end_date: Option<String>,
    #[arg(long)]
    amount_min: Option<Decimal>,
    #[arg(long)]
    amount_max: Option<Decimal>,
    /// credit or debit
    #[arg(long = "type")]
    kind: Option<TransactionKind>,
}

#[derive(Args)]
pub struct ContactArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    message: String,
}

/// Build the client over the session file in `data_dir`
pub fn build_client(config: &CliConfig, data_dir: &Path) -> Result<PesaClient> {
    let storage = FileStorage::new(data_dir.join(SESSION_FILE));
    debug!(path = %storage.path().display(), "Using session file");
    PesaClient::builder()
        .config(config.api.clone())
        .session_config(config.session.clone())
        .storage(Arc::new(storage))
        .build()
        .context("Failed to build API client")
}

impl Commands {
    pub async fn execute(self, client: &PesaClient) -> Result<()> {
        let session = client.session();
        let state = session.initialize();
        debug!(?state, "Session initialized");

        match self {
            Self::Login { username, password } => login(session, username, password).await,
            Self::Logout => logout(session),
            Self::Status => {
                status(session);
                Ok(())
            }
            Self::Register(args) => register(client, args).await,
            Self::Contact(args) => contact(client, args).await,
            Self::Account(command) => {
                if state == AuthenticationState::Unauthenticated {
                    bail!(LOGIN_HINT);
                }
                command
                    .execute(client)
                    .await
                    .map_err(|e| explain(session, e))
            }
        }
    }
}

impl AccountCommands {
    pub async fn execute(self, client: &PesaClient) -> Result<(), ClientError> {
        match self {
            Self::Profile => {
                let profile = client.profile().await?;
                print_profile(&profile);
            }
            Self::UpdateProfile(args) => {
                let update = ProfileUpdate {
                    id_number: args.id_number,
                    phone: args.phone,
                    address: args.address,
                    date_of_birth: args.date_of_birth,
                    bio: args.bio,
                };
                let profile = client.update_profile(&update).await?;
                println!("Profile updated");
                print_profile(&profile);
            }
            Self::Wallet => {
                let wallet = client.wallet().await?;
                println!("Balance: KES {}", wallet.balance);
                println!("PIN set: {}", if wallet.has_pin { "yes" } else { "no" });
            }
            Self::History => {
                let entries = client.wallet_history().await?;
                if entries.is_empty() {
                    println!("No wallet activity");
                }
                for entry in entries {
                    println!(
                        "{}  {:<12} {:>12}  {}",
                        entry.timestamp,
                        entry.transaction_type,
                        entry.amount,
                        entry.status.as_deref().unwrap_or("-")
                    );
                }
            }
            Self::SetPin { pin } => {
                client.set_wallet_pin(&pin).await?;
                println!("Wallet PIN set");
            }
            Self::Mpesa { phone, amount } => {
                let ack = client.stk_push(&phone, amount).await?;
                info!(%phone, amount, "STK push requested");
                println!("Check your phone to complete the deposit");
                print_reply(&ack);
            }
            Self::Send {
                recipient,
                amount,
                pin,
            } => {
                let transfer = TransferRequest {
                    recipient,
                    amount,
                    pin,
                };
                let reply = client.transfer(&transfer).await?;
                println!("Sent KES {} to {}", transfer.amount, transfer.recipient);
                print_reply(&reply);
            }
            Self::Transactions(args) => {
                let filter = TransactionFilter {
                    start_date: args.start_date,
                    end_date: args.end_date,
                    amount_min: args.amount_min,
                    amount_max: args.amount_max,
                    kind: args.kind,
                };
                let transactions = client.transactions(&filter).await?;
                if transactions.is_empty() {
                    println!("No transactions");
                }
                for tx in transactions {
                    println!(
                        "{}  {:<6} {:>12}  {} -> {}  {}",
                        tx.timestamp,
                        tx.kind,
                        tx.amount,
                        tx.sender_username.as_deref().unwrap_or("-"),
                        tx.receiver_username.as_deref().unwrap_or("-"),
                        tx.status.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Ok(())
    }
}

async fn login(session: &SessionManager, username: String, password: Option<String>) -> Result<()> {
    let password =
        password.ok_or_else(|| anyhow!("Password required: pass --password or set PESA_PASSWORD"))?;
    let identity = session
        .login(&Credentials::new(username.clone(), password))
        .await?;
    let who = identity.subject().unwrap_or(username);
    println!("Logged in as {who}");
    Ok(())
}

fn logout(session: &SessionManager) -> Result<()> {
    session.clear_error();
    session.logout();
    if let Some(message) = session.last_error() {
        bail!(message);
    }
    println!("Logged out");
    Ok(())
}

fn status(session: &SessionManager) {
    match session.identity() {
        Some(identity) => {
            let who = identity.subject().unwrap_or_else(|| "unknown user".to_string());
            println!("Logged in as {who}");
            if let Some(expires_at) = identity.expires_at() {
                println!("Access token expires at {}", expires_at.to_rfc3339());
            }
        }
        None => println!("Not logged in"),
    }
}

async fn register(client: &PesaClient, args: RegisterArgs) -> Result<()> {
    let registration = Registration {
        username: args.username,
        email: args.email,
        password: args.password,
        id_number: args.id_number,
        phone: args.phone,
        address: args.address,
        date_of_birth: args.date_of_birth,
        bio: args.bio,
    };
    client
        .register(&registration)
        .await
        .map_err(describe_field_errors)?;
    println!(
        "Account {} created. Log in with `pesa login --username {}`",
        registration.username, registration.username
    );
    Ok(())
}

async fn contact(client: &PesaClient, args: ContactArgs) -> Result<()> {
    let message = ContactMessage {
        name: args.name,
        email: args.email,
        subject: args.subject,
        message: args.message,
    };
    let confirmation = client
        .send_contact_message(&message)
        .await
        .map_err(describe_field_errors)?;
    println!("{confirmation}");
    Ok(())
}

/// Turn a failed authenticated call into a user-facing error
fn explain(session: &SessionManager, error: ClientError) -> anyhow::Error {
    if error.requires_login() || !session.is_authenticated() {
        debug!(error = %error, "Session lost");
        anyhow!(LOGIN_HINT)
    } else {
        describe_field_errors(error)
    }
}

fn describe_field_errors(error: ClientError) -> anyhow::Error {
    let fields = error.field_errors();
    if fields.is_empty() {
        return error.into();
    }
    let details = fields
        .iter()
        .map(|(field, message)| format!("  {field}: {message}"))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow!("Request rejected:\n{details}")
}

fn print_profile(profile: &pesa_http::Profile) {
    let rows = [
        ("Username", &profile.username),
        ("Email", &profile.email),
        ("ID number", &profile.id_number),
        ("Phone", &profile.phone),
        ("Address", &profile.address),
        ("Date of birth", &profile.date_of_birth),
        ("Bio", &profile.bio),
    ];
    for (label, value) in rows {
        println!("{label:<14} {}", value.as_deref().unwrap_or("-"));
    }
}

fn print_reply(reply: &serde_json::Value) {
    let message = ["message", "detail", "CustomerMessage", "ResponseDescription"]
        .iter()
        .find_map(|key| reply.get(*key).and_then(serde_json::Value::as_str));
    if let Some(message) = message {
        println!("{message}");
    }
}
