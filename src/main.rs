use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use argus::{
    asset::{Asset, ServiceKind},
    classification::rules::RuleSet,
    config::EngineConfig,
    connection::{ConnectionValidator, RoleReference},
    discovery::{CellEvent, DiscoveryEngine, DiscoveryRequest, DiscoveryResult},
    inventory::{classify_result, ClassifiedAsset, InventorySink, JsonFileInventory},
    output::{DiscoveryReport, OutputConfig, OutputFormat, OutputManager},
    provider::{mock::Fixture, IdentityProbe, MockProvider, ResourceProvider, StaticIdentityProbe},
};

fn cli() -> Command {
    Command::new("argus")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cloud asset discovery and classification")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Config file (default: ~/.argus.toml)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("fixtures")
                .long("fixtures")
                .value_name("FILE")
                .help("JSON fixture describing the account; a built-in demo estate is used otherwise")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Output format: text or json")
                .default_value("text")
                .global(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write output to a file instead of stdout")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show relationships and matched rules; debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("test-connection")
                .about("Validate a delegated-access role")
                .arg(role_arg().required(true))
                .arg(external_id_arg().required(true)),
        )
        .subcommand(
            Command::new("discover")
                .about("Discover and classify the resources of an account")
                .arg(
                    Arg::new("account")
                        .short('a')
                        .long("account")
                        .value_name("ACCOUNT_ID")
                        .help("Account to discover")
                        .required_unless_present("role-arn"),
                )
                .arg(
                    Arg::new("regions")
                        .short('r')
                        .long("regions")
                        .value_name("REGIONS")
                        .help("Comma separated regions (default from config)")
                        .value_delimiter(','),
                )
                .arg(
                    Arg::new("services")
                        .short('s')
                        .long("services")
                        .value_name("SERVICES")
                        .help("Comma separated services (default: all)"),
                )
                .arg(rules_arg())
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_name("N")
                        .help("Maximum cells in flight")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("inventory")
                        .long("inventory")
                        .value_name("FILE")
                        .help("Upsert results into a JSON inventory file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(role_arg().help("Validate this role before discovering"))
                .arg(external_id_arg().requires("role-arn"))
                .arg(
                    Arg::new("no-progress")
                        .long("no-progress")
                        .help("Hide the progress bar")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("classify")
                .about("Classify previously discovered assets")
                .arg(
                    Arg::new("input")
                        .value_name("FILE")
                        .help("Discovery result or JSON array of assets")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .index(1),
                )
                .arg(rules_arg()),
        )
}

fn role_arg() -> Arg {
    Arg::new("role-arn")
        .long("role-arn")
        .value_name("ARN")
        .help("Role to assume, arn:aws:iam::<account>:role/<name>")
}

fn external_id_arg() -> Arg {
    Arg::new("external-id")
        .long("external-id")
        .value_name("ID")
        .help("External id configured on the role's trust policy")
}

fn rules_arg() -> Arg {
    Arg::new("rules")
        .long("rules")
        .value_name("FILE")
        .help("Classification rules (TOML or JSON)")
        .value_parser(clap::value_parser!(PathBuf))
}

/// Provider and probe backing this run
struct Backend {
    provider: Arc<dyn ResourceProvider>,
    probe: Option<Arc<dyn IdentityProbe>>,
}

fn load_backend(matches: &ArgMatches, account_hint: Option<&str>) -> anyhow::Result<Backend> {
    match matches.get_one::<PathBuf>("fixtures") {
        Some(path) => {
            let fixture = Fixture::load(path)?;
            Ok(Backend {
                provider: Arc::new(fixture.provider()),
                probe: fixture
                    .identity_probe()
                    .map(|p| Arc::new(p) as Arc<dyn IdentityProbe>),
            })
        }
        None => {
            let account = account_hint.unwrap_or("123456789012");
            log::info!("No fixtures given, using the built-in demo estate for {}", account);
            Ok(Backend {
                provider: Arc::new(MockProvider::sample(account)),
                probe: None,
            })
        }
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<EngineConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::load_default_config(),
    };
    Ok(config)
}

fn load_rules(path: Option<&PathBuf>, config: &EngineConfig) -> anyhow::Result<RuleSet> {
    match path.or(config.rules_file.as_ref()) {
        Some(path) => {
            let rules = RuleSet::from_file(path)?;
            log::info!("Loaded {} enabled rules from {}", rules.len(), path.display());
            Ok(rules)
        }
        None => Ok(RuleSet::default()),
    }
}

fn output_manager(matches: &ArgMatches) -> anyhow::Result<OutputManager> {
    let format = matches
        .get_one::<String>("format")
        .map(|f| f.parse::<OutputFormat>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or(OutputFormat::Text);
    Ok(OutputManager::new(OutputConfig {
        format,
        file: matches.get_one::<PathBuf>("output").cloned(),
        colored: !matches.get_flag("no-color"),
        verbose: matches.get_flag("verbose"),
    }))
}

fn validator(backend: &Backend, role: &str, config: &EngineConfig) -> ConnectionValidator {
    let probe: Arc<dyn IdentityProbe> = match &backend.probe {
        Some(probe) => probe.clone(),
        None => {
            // offline: resolve to the role's own account
            let account = RoleReference::parse(role)
                .map(|r| r.account_id().to_string())
                .unwrap_or_default();
            Arc::new(StaticIdentityProbe::new(&account, config.default_regions.clone()))
        }
    };
    ConnectionValidator::new(probe, config.probe_timeout())
}

async fn test_connection(sub: &ArgMatches, config: &EngineConfig) -> anyhow::Result<bool> {
    let role = sub.get_one::<String>("role-arn").map(String::as_str).unwrap_or_default();
    let external_id = sub.get_one::<String>("external-id").map(String::as_str).unwrap_or_default();
    let backend = load_backend(sub, None)?;

    let result = validator(&backend, role, config).test_connection(role, external_id).await;
    output_manager(sub)?.write_connection(&result)?;
    Ok(result.success)
}

fn progress_bar(mut events: mpsc::UnboundedReceiver<CellEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} cells {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        while let Some(event) = events.recv().await {
            match event {
                CellEvent::Planned(total) => bar.set_length(total as u64),
                CellEvent::Completed { cell, errors, .. } => {
                    bar.inc(1);
                    if errors > 0 {
                        bar.set_message(format!("{} {}", cell, "failed".yellow()));
                    } else {
                        bar.set_message(cell.to_string());
                    }
                }
                CellEvent::Skipped(_) => bar.inc(1),
            }
        }
        bar.finish_and_clear();
    })
}

async fn discover(sub: &ArgMatches, mut config: EngineConfig) -> anyhow::Result<bool> {
    if let Some(n) = sub.get_one::<usize>("concurrency") {
        config = config.with_max_concurrency(*n);
        config.validate()?;
    }

    let role = sub.get_one::<String>("role-arn");
    let account = match (sub.get_one::<String>("account"), role) {
        (Some(account), _) => account.clone(),
        (None, Some(role)) => RoleReference::parse(role)?.account_id().to_string(),
        (None, None) => anyhow::bail!("--account or --role-arn is required"),
    };
    let backend = load_backend(sub, Some(&account))?;

    if let Some(role) = role {
        let external_id = sub.get_one::<String>("external-id").map(String::as_str).unwrap_or_default();
        let result = validator(&backend, role, &config).test_connection(role, external_id).await;
        if !result.success {
            output_manager(sub)?.write_connection(&result)?;
            return Ok(false);
        }
    }

    let regions: Vec<String> = match sub.get_many::<String>("regions") {
        Some(values) => values.cloned().collect(),
        None => config.default_regions.clone(),
    };
    let services = match sub.get_one::<String>("services") {
        Some(list) => ServiceKind::parse_list(list).map_err(anyhow::Error::msg)?,
        None => config.services(),
    };
    let rules = load_rules(sub.get_one::<PathBuf>("rules"), &config)?;

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "[!] Cancelling, waiting for running cells".bright_yellow());
            ctrl_c_token.cancel();
        }
    });

    let mut engine = DiscoveryEngine::new(backend.provider.clone(), &config).with_cancellation(token);
    // json on stdout stays machine readable
    let json_to_stdout = sub.get_one::<PathBuf>("output").is_none()
        && sub.get_one::<String>("format").map(String::as_str) == Some("json");
    let progress = if sub.get_flag("no-progress") || json_to_stdout {
        None
    } else {
        let (tx, rx) = mpsc::unbounded_channel();
        engine = engine.with_progress(tx);
        Some(progress_bar(rx))
    };

    let request = DiscoveryRequest::new(account.clone(), regions).with_services(services);
    let result = engine.discover_request(&request).await;
    drop(engine);
    if let Some(handle) = progress {
        let _ = handle.await;
    }

    let classified = classify_result(&result, &rules);
    let mut report = DiscoveryReport::new(&result, classified.clone());
    if let Some(path) = sub.get_one::<PathBuf>("inventory") {
        let sink = JsonFileInventory::open(path)?;
        report = report.with_inventory(sink.upsert(&account, classified).await?);
    }
    output_manager(sub)?.write_report(&report)?;
    Ok(result.is_complete())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifyInput {
    Result(Box<DiscoveryResult>),
    Assets(Vec<Asset>),
}

async fn classify(sub: &ArgMatches, config: &EngineConfig) -> anyhow::Result<bool> {
    let path = sub
        .get_one::<PathBuf>("input")
        .ok_or_else(|| anyhow::anyhow!("input file is required"))?;
    let content = std::fs::read_to_string(path)?;
    let rules = load_rules(sub.get_one::<PathBuf>("rules"), config)?;

    let result = match serde_json::from_str::<ClassifyInput>(&content)? {
        ClassifyInput::Result(result) => *result,
        ClassifyInput::Assets(assets) => DiscoveryResult {
            scan_id: "offline".to_string(),
            account_id: assets.first().map(|a| a.account_id.clone()).unwrap_or_default(),
            started_at: chrono::Utc::now(),
            assets,
            services_scanned: Vec::new(),
            regions_scanned: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
            cancelled: false,
            cells_skipped: Vec::new(),
        },
    };

    let classified: Vec<ClassifiedAsset> = classify_result(&result, &rules);
    output_manager(sub)?.write_report(&DiscoveryReport::new(&result, classified))?;
    Ok(true)
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    // global args are propagated down into the subcommand's matches
    let Some((command, sub)) = matches.subcommand() else {
        unreachable!("clap requires a subcommand");
    };

    let config = match load_config(sub) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "[!] Invalid configuration:".bright_red(), e);
            process::exit(2);
        }
    };

    let level = if sub.get_flag("verbose") {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let outcome = match command {
        "test-connection" => test_connection(sub, &config).await,
        "discover" => discover(sub, config.clone()).await,
        "classify" => classify(sub, &config).await,
        other => unreachable!("unknown subcommand {}", other),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "[!] ERROR:".bright_red(), e);
            process::exit(2);
        }
    }
}
