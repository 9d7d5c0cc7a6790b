//! AgenticDID CLI — `adid` command.
//!
//! Runs the full trust flow in-process for a catalogue of demo agents:
//! challenge, presentation, credential-state lookup, capability token and
//! the resource-side authorization check.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use agentic_did::capability::{verify_token, ActionRequirement};
use agentic_did::time::micros_to_rfc3339;
use agentic_did::{
    AgentCredential, Clock, Denial, InMemoryOracle, Policy, PresentationBuilder,
    RevocationReason, Role, SystemClock, TrustError, VerifierConfig, VerifierService,
};

/// Exit status when the protocol refuses an agent.
const EXIT_DENIED: i32 = 2;

// ── Demo catalogue ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct AgentProfile {
    id: &'static str,
    name: &'static str,
    role: Role,
    scopes: &'static [&'static str],
    /// Credential is revoked at the oracle.
    revoked: bool,
    /// Action tried when `--action` is omitted.
    default_action: &'static str,
}

fn agent_catalogue() -> Vec<AgentProfile> {
    vec![
        AgentProfile {
            id: "banker",
            name: "Legit Banker Agent",
            role: Role::Banker,
            scopes: &["bank:transfer", "bank:balance"],
            revoked: false,
            default_action: "transfer",
        },
        AgentProfile {
            id: "traveler",
            name: "Legit Traveler Agent",
            role: Role::Traveler,
            scopes: &["travel:book", "travel:cancel"],
            revoked: false,
            default_action: "flight",
        },
        AgentProfile {
            id: "shopper",
            name: "Shopping Agent",
            role: Role::Shopper,
            scopes: &["shop:purchase", "shop:cart"],
            revoked: false,
            default_action: "shop",
        },
        AgentProfile {
            id: "rogue",
            name: "Rogue Agent",
            role: Role::Banker,
            scopes: &["bank:transfer", "admin:*"],
            revoked: true,
            default_action: "transfer",
        },
    ]
}

fn action_catalogue() -> Vec<ActionRequirement> {
    vec![
        ActionRequirement::new("transfer", Role::Banker, "bank:transfer"),
        ActionRequirement::new("shop", Role::Shopper, "shop:purchase"),
        ActionRequirement::new("flight", Role::Traveler, "travel:book"),
    ]
}

/// Policy the oracle holds for each role.
fn role_policy(role: &Role) -> Policy {
    match role {
        Role::Banker => Policy::new(Role::Banker, ["bank:transfer", "bank:balance"]),
        Role::Traveler => Policy::new(Role::Traveler, ["travel:book", "travel:cancel"]),
        Role::Shopper => Policy::new(Role::Shopper, ["shop:purchase", "shop:cart"]),
        other => Policy::new(other.clone(), ["read"]),
    }
}

fn find_agent(id: &str) -> Result<AgentProfile> {
    agent_catalogue()
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| anyhow!("unknown agent '{id}' (try `adid agents`)"))
}

fn find_action(id: &str) -> Result<ActionRequirement> {
    action_catalogue()
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| anyhow!("unknown action '{id}' (try `adid actions`)"))
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// AgenticDID CLI — run the agent trust protocol end to end.
#[derive(Parser, Debug)]
#[command(
    name = "adid",
    about = "AgenticDID CLI",
    version,
    long_about = "adid — AgenticDID CLI\n\nIssue challenges, verify agent presentations against the\ncredential-state oracle and mint scoped capability tokens."
)]
struct Cli {
    /// Load verifier configuration from a JSON file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the challenge TTL (seconds)
    #[arg(long, global = true)]
    challenge_ttl: Option<u64>,

    /// Override the capability token TTL (seconds)
    #[arg(long, global = true)]
    token_ttl: Option<u64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the demo agents
    Agents,

    /// List the protected actions and what they require
    Actions,

    /// Print the effective verifier configuration
    Config,

    /// Run the protocol for one agent and one action
    Run {
        /// Agent id (banker, traveler, shopper, rogue)
        #[arg(long)]
        agent: String,

        /// Action id (defaults to the agent's own action)
        #[arg(long)]
        action: Option<String>,

        /// Audience the challenge is bound to
        #[arg(long)]
        audience: Option<String>,

        /// Disclose only these scopes (comma separated)
        #[arg(long, value_delimiter = ',')]
        disclose: Option<Vec<String>>,
    },

    /// Run every agent against its default action
    Demo,
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Agents => cmd_agents(cli.verbose),
        Commands::Actions => cmd_actions(),
        Commands::Config => cmd_config(&config),
        Commands::Run {
            agent,
            action,
            audience,
            disclose,
        } => cmd_run(
            config,
            &agent,
            action.as_deref(),
            audience.as_deref(),
            disclose,
            cli.verbose,
        ),
        Commands::Demo => cmd_demo(config, cli.verbose),
    });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_DENIED),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<VerifierConfig> {
    let mut config = match &cli.config {
        Some(path) => VerifierConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => VerifierConfig::default(),
    };
    if let Some(secs) = cli.challenge_ttl {
        config = config.with_challenge_ttl(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.token_ttl {
        config = config.with_token_ttl(Duration::from_secs(secs));
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

// ── Command implementations ───────────────────────────────────────────────────

fn cmd_agents(verbose: bool) -> Result<bool> {
    println!("{:<10} {:<10} {:<8} SCOPES", "AGENT", "ROLE", "STATE");
    println!("{}", "-".repeat(60));
    for agent in agent_catalogue() {
        let state = if agent.revoked { "revoked" } else { "active" };
        println!(
            "{:<10} {:<10} {:<8} {}",
            agent.id,
            agent.role,
            state,
            agent.scopes.join(",")
        );
        if verbose {
            println!("{:<10} {} (default action: {})", "", agent.name, agent.default_action);
        }
    }
    Ok(true)
}

fn cmd_actions() -> Result<bool> {
    println!("{:<10} {:<10} SCOPE", "ACTION", "ROLE");
    println!("{}", "-".repeat(40));
    for action in action_catalogue() {
        println!(
            "{:<10} {:<10} {}",
            action.id, action.required_role, action.required_scope
        );
    }
    Ok(true)
}

fn cmd_config(config: &VerifierConfig) -> Result<bool> {
    print_json(config)?;
    Ok(true)
}

/// Outcome of one protocol run, printed as JSON.
#[derive(Debug, Serialize)]
struct RunReport {
    agent: String,
    action: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    denial: Option<Denial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grant: Option<serde_json::Value>,
}

impl RunReport {
    fn authorized(&self) -> bool {
        self.outcome == "authorized"
    }
}

/// In-process deployment: one oracle with every demo agent enrolled.
struct Deployment {
    service: VerifierService,
    credentials: Vec<(AgentProfile, AgentCredential, agentic_did::CredentialStateReceipt)>,
    clock: Arc<dyn Clock>,
}

fn deploy(config: VerifierConfig) -> Result<Deployment> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let oracle = Arc::new(InMemoryOracle::new(clock.clone()));

    let mut credentials = Vec::new();
    for profile in agent_catalogue() {
        let credential = AgentCredential::create(profile.role.clone(), profile.scopes.iter().copied())
            .with_context(|| format!("failed to create credential for {}", profile.id))?;
        let receipt = oracle
            .register(&credential, role_policy(&profile.role))
            .with_context(|| format!("failed to enrol {}", profile.id))?;
        if profile.revoked {
            oracle.revoke(&credential.cred_hash, RevocationReason::Compromised)?;
        }
        credentials.push((profile, credential, receipt));
    }

    let service = VerifierService::builder(oracle)
        .config(config)
        .clock(clock.clone())
        .build()
        .context("failed to build verifier service")?;

    Ok(Deployment {
        service,
        credentials,
        clock,
    })
}

async fn run_agent(
    deployment: &Deployment,
    agent_id: &str,
    action: &ActionRequirement,
    audience: &str,
    disclose: Option<Vec<String>>,
) -> Result<RunReport> {
    let (profile, credential, receipt) = deployment
        .credentials
        .iter()
        .find(|(p, _, _)| p.id == agent_id)
        .ok_or_else(|| anyhow!("agent '{agent_id}' is not enrolled"))?;

    let service = &deployment.service;
    let report = |outcome: &'static str, denial: Option<Denial>, grant: Option<serde_json::Value>| RunReport {
        agent: profile.id.to_string(),
        action: action.id.clone(),
        outcome,
        denial,
        grant,
    };

    let challenge = service.get_challenge(audience)?;
    log::debug!("challenge for {audience} expires {}", micros_to_rfc3339(challenge.expires_at));

    let mut builder = PresentationBuilder::new(credential, &challenge, receipt.clone());
    if let Some(scopes) = disclose {
        builder = builder.disclose_scopes(scopes);
    }
    let vp = builder.build().context("failed to build presentation")?;

    let grant = match service.present_vp(&vp, &challenge.nonce).await {
        Ok(grant) => grant,
        Err(e) => return Ok(report("denied", Some(Denial::from(&e)), None)),
    };

    // Resource side: check the token, its key binding and the action.
    let resource_check = verify_token(
        &grant.token.compact,
        service.issuer_public_key(),
        audience,
        deployment.clock.now_micros(),
    )
    .and_then(|claims| {
        claims.confirm_key(credential.verifying_key())?;
        claims.authorize(action)?;
        Ok(claims)
    });

    let scopes: BTreeSet<&str> = grant.scopes.iter().map(String::as_str).collect();
    let summary = json!({
        "role": grant.role,
        "scopes": scopes,
        "token": grant.token.compact,
        "expires_at": grant.token.claims.exp,
        "key_thumbprint": grant.token.claims.cnf.jkt,
    });

    Ok(match resource_check {
        Ok(_) => report("authorized", None, Some(summary)),
        Err(e @ TrustError::Forbidden(_)) => report("forbidden", Some(Denial::from(&e)), Some(summary)),
        Err(e) => report("denied", Some(Denial::from(&e)), Some(summary)),
    })
}

fn cmd_run(
    config: VerifierConfig,
    agent_id: &str,
    action_id: Option<&str>,
    audience: Option<&str>,
    disclose: Option<Vec<String>>,
    verbose: bool,
) -> Result<bool> {
    let profile = find_agent(agent_id)?;
    let action = find_action(action_id.unwrap_or(profile.default_action))?;
    let audience = audience
        .map(str::to_string)
        .unwrap_or_else(|| format!("resource:{}", action.id));

    let deployment = deploy(config)?;
    let report = runtime()?.block_on(run_agent(
        &deployment,
        profile.id,
        &action,
        &audience,
        disclose,
    ))?;

    if verbose {
        eprintln!(
            "{} -> {} on {audience}: {}",
            profile.id, action.id, report.outcome
        );
    }
    print_json(&report)?;
    Ok(report.authorized())
}

fn cmd_demo(config: VerifierConfig, verbose: bool) -> Result<bool> {
    let deployment = deploy(config)?;
    let rt = runtime()?;

    println!("{:<10} {:<10} {:<11} DETAIL", "AGENT", "ACTION", "OUTCOME");
    println!("{}", "-".repeat(72));
    for profile in agent_catalogue() {
        let action = find_action(profile.default_action)?;
        let audience = format!("resource:{}", action.id);
        let report = rt.block_on(run_agent(&deployment, profile.id, &action, &audience, None))?;
        let detail = match (&report.denial, &report.grant) {
            (Some(denial), _) => format!("{}: {}", denial.kind, denial.detail),
            (None, Some(grant)) if verbose => grant.to_string(),
            (None, Some(grant)) => format!("scopes {}", grant["scopes"]),
            (None, None) => String::new(),
        };
        println!(
            "{:<10} {:<10} {:<11} {}",
            report.agent, report.action, report.outcome, detail
        );
    }
    Ok(true)
}
