use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use krbdir_client::{NameFilter, SearchPage, Session};
use krbdir_core::{
    render_error, Error, FieldMask, Principal, PrincipalFlag, PrincipalFlags, PrincipalSeed,
    SessionConfig,
};
use krbdir_memstore::{ReferenceStore, StoreConfig, DEFAULT_REALM};
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "krbdir")]
#[command(about = "Principal directory administration")]
struct Cli {
    /// Fixture file for the reference store
    #[arg(long, env = "KRBDIR_FIXTURE")]
    fixture: PathBuf,

    /// Realm served by the reference store
    #[arg(long, env = "KRBDIR_REALM", default_value = DEFAULT_REALM)]
    store_realm: String,

    /// Administrative principal
    #[arg(short = 'u', long)]
    admin: String,

    /// Administrative password
    #[arg(short = 'p', long, env = "KRBDIR_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Keytab for the administrative principal
    #[arg(short = 'k', long, conflicts_with = "password")]
    keytab: Option<PathBuf>,

    /// Realm to administer (defaults to the service realm)
    #[arg(short = 'r', long)]
    realm: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show a principal
    Get {
        /// Principal name
        name: String,
    },
    /// Create a principal
    Create {
        /// Principal name
        name: String,
        /// Policy to assign
        #[arg(long)]
        policy: Option<String>,
        /// Initial password
        #[arg(long)]
        password: Option<String>,
        /// Raw attribute bits
        #[arg(long)]
        attributes: Option<u32>,
    },
    /// Delete a principal
    Delete {
        /// Principal name
        name: String,
    },
    /// List principals matching a query
    List {
        /// Exact name or glob with `*`; all principals when omitted
        query: Option<String>,
        /// Names starting with a prefix
        #[arg(long, conflicts_with_all = ["query", "ends_with", "contains"])]
        starts_with: Option<String>,
        /// Names ending with a suffix
        #[arg(long, conflicts_with_all = ["query", "contains"])]
        ends_with: Option<String>,
        /// Names containing a substring
        #[arg(long, conflicts_with = "query")]
        contains: Option<String>,
        /// Page size (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        page_size: usize,
        /// Index of the first match to return
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Modify a principal
    Modify {
        /// Principal name
        name: String,
        /// Policy to assign
        #[arg(long, conflicts_with = "clear_policy")]
        policy: Option<String>,
        /// Remove the assigned policy
        #[arg(long)]
        clear_policy: bool,
        /// Raw attribute bits
        #[arg(long)]
        attributes: Option<u32>,
        /// Named flag to turn on (e.g. requiresPreauth)
        #[arg(long = "set", value_name = "FLAG")]
        set: Vec<PrincipalFlag>,
        /// Named flag to turn off (e.g. allowTix)
        #[arg(long = "unset", value_name = "FLAG")]
        unset: Vec<PrincipalFlag>,
    },
    /// Rename a principal
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
    },
    /// Change a principal's password
    Cpw {
        /// Principal name
        name: String,
        /// New password
        password: String,
    },
    /// Re-authenticate the administrative session
    Renew,
}

enum Output {
    Principal(Principal),
    Page(Option<SearchPage>),
    Done(String),
}

// ────────────────────────────────────── Entry Point ──────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store_config = StoreConfig::new(&cli.fixture).with_realm(&cli.store_realm);
    let store = ReferenceStore::open(&store_config).map_err(|err| rendered(&err, false))?;

    let config = session_config(&cli);
    let mut session = Session::init(Arc::new(store), &config)
        .await
        .map_err(|err| rendered(&err, false))?;

    let result = match execute(&mut session, &config, cli.command).await {
        Ok(output) => print_output(&output, cli.json),
        Err(err) => Err(rendered(&err, session.is_connected())),
    };
    session.destroy().await;
    result
}

fn session_config(cli: &Cli) -> SessionConfig {
    let mut config =
        SessionConfig::new(cli.admin.clone()).with_operation_timeout_secs(cli.timeout);
    if let Some(realm) = &cli.realm {
        config = config.with_realm(realm.clone());
    }
    if let Some(keytab) = &cli.keytab {
        config = config.with_keytab(keytab.clone());
    }
    if let Some(password) = &cli.password {
        config = config.with_password(password.clone());
    }
    config
}

fn rendered(err: &Error, connected: bool) -> anyhow::Error {
    if err.should_log() {
        error!("{err}");
    } else {
        debug!("{err}");
    }
    anyhow!(render_error(err, connected))
}

// ────────────────────────────────────── Commands ──────────────────────────────────────

async fn execute(
    session: &mut Session,
    config: &SessionConfig,
    command: Command,
) -> Result<Output, Error> {
    match command {
        Command::Get { name } => session.client().get(&name).await.map(Output::Principal),
        Command::Create {
            name,
            policy,
            password,
            attributes,
        } => {
            let mut seed = PrincipalSeed::new(name.as_str());
            let mut mask = FieldMask::empty();
            if let Some(policy) = policy {
                seed = seed.with_policy(policy);
                mask |= FieldMask::POLICY;
            }
            if let Some(bits) = attributes {
                seed = seed.with_attributes(PrincipalFlags::from_bits_retain(bits));
                mask |= FieldMask::ATTRIBUTES;
            }
            let secret = password.map(SecretString::from);
            session.client().create(&seed, mask, secret).await?;
            Ok(Output::Done(format!("created {name}")))
        }
        Command::Delete { name } => {
            session.client().delete(&name).await?;
            Ok(Output::Done(format!("deleted {name}")))
        }
        Command::List {
            query,
            starts_with,
            ends_with,
            contains,
            page_size,
            offset,
        } => {
            let query = list_filter(starts_with, ends_with, contains)
                .map_or(query, |filter| filter.to_query());
            session
                .client()
                .search(query.as_deref(), page_size, offset)
                .await
                .map(Output::Page)
        }
        Command::Modify {
            name,
            policy,
            clear_policy,
            attributes,
            set,
            unset,
        } => {
            let mut client = session.client();
            let mut seed = PrincipalSeed::new(name.as_str());
            let mut mask = FieldMask::empty();
            if let Some(policy) = policy {
                seed = seed.with_policy(policy);
                mask |= FieldMask::POLICY;
            } else if clear_policy {
                mask |= FieldMask::POLICY_CLEAR;
            }
            if attributes.is_some() || !set.is_empty() || !unset.is_empty() {
                let mut flags = match attributes {
                    Some(bits) => PrincipalFlags::from_bits_retain(bits),
                    None => client.get(&name).await?.attributes,
                };
                for flag in set {
                    flags = flags.with_flag(flag, true);
                }
                for flag in unset {
                    flags = flags.with_flag(flag, false);
                }
                seed = seed.with_attributes(flags);
                mask |= FieldMask::ATTRIBUTES;
            }
            client.modify(&seed, mask).await?;
            Ok(Output::Done(format!("modified {name}")))
        }
        Command::Rename { old, new } => {
            session.client().rename(&old, &new).await?;
            Ok(Output::Done(format!("renamed {old} to {new}")))
        }
        Command::Cpw { name, password } => {
            session
                .client()
                .change_credential(&name, &SecretString::from(password))
                .await?;
            Ok(Output::Done(format!("changed password for {name}")))
        }
        Command::Renew => {
            session.renew(config).await?;
            Ok(Output::Done(format!(
                "session renewed in realm {}",
                session.realm().unwrap_or("<none>")
            )))
        }
    }
}

fn list_filter(
    starts_with: Option<String>,
    ends_with: Option<String>,
    contains: Option<String>,
) -> Option<NameFilter> {
    starts_with
        .map(NameFilter::StartsWith)
        .or_else(|| ends_with.map(NameFilter::EndsWith))
        .or_else(|| contains.map(NameFilter::Contains))
}

// ────────────────────────────────────── Output ──────────────────────────────────────

fn print_output(output: &Output, json: bool) -> anyhow::Result<()> {
    if json {
        let value = match output {
            Output::Principal(principal) => serde_json::to_value(principal),
            Output::Page(page) => serde_json::to_value(page),
            Output::Done(message) => Ok(serde_json::json!({ "result": message })),
        }
        .context("failed to serialize output")?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match output {
        Output::Principal(principal) => print_principal(principal),
        Output::Page(None) => println!("offset is beyond the last match"),
        Output::Page(Some(page)) => {
            for principal in &page.principals {
                println!("{}", principal.name);
            }
            if page.remaining > 0 {
                println!("({} more)", page.remaining);
            }
        }
        Output::Done(message) => println!("{message}"),
    }
    Ok(())
}

fn print_principal(principal: &Principal) {
    let time = |value: Option<DateTime<Utc>>| {
        value.map_or_else(|| "never".to_string(), |at| at.to_rfc3339())
    };
    let life = |value: Option<std::time::Duration>| {
        value.map_or_else(|| "unlimited".to_string(), |d| format!("{}s", d.as_secs()))
    };

    println!("Principal: {}", principal.name);
    println!("Expiration: {}", time(principal.expiration));
    println!("Password expiration: {}", time(principal.password_expiration));
    println!("Last password change: {}", time(principal.last_password_change));
    println!(
        "Last modified: {} by {}",
        time(principal.modified_at),
        principal
            .modified_by
            .as_ref()
            .map_or_else(|| "unknown".to_string(), ToString::to_string)
    );
    println!("Policy: {}", principal.policy.as_deref().unwrap_or("none"));
    println!("Maximum ticket life: {}", life(principal.max_ticket_life));
    println!("Maximum renewable life: {}", life(principal.max_renewable_life));
    println!("Attributes: {:#x}", principal.attributes.bits());
    for flag in PrincipalFlag::ALL {
        println!("  {flag}: {}", principal.attributes.flag(flag));
    }
}
