use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mcs_api::{AdmissionConfig, AnyObject, ApiError, ApplyOutcome, Multicluster, Scheme};
use mcs_core::ErrorList;
use mcs_schema::{validate_service_export, validate_service_import, SetDefaults};
use mcs_status::{headless_condition, import_type, HeadlessObservation};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "mcsctl", version, about = "Multicluster service admission tool")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Request namespace for manifests that omit one
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print manifests with defaults applied
    Default {
        /// YAML or JSON file; may hold several documents
        file: PathBuf,
    },
    /// Validate manifests and print every field error
    Validate {
        file: PathBuf,
    },
    /// Replay manifests in order through an in-memory registry
    Apply {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Aggregate per-cluster headlessness into the Headless condition
    Headless {
        /// Observations as cluster=true|false
        #[arg(required = true)]
        observations: Vec<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("MCS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("MCS_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid MCS_METRICS_ADDR; expected host:port");
        }
    }
}

/// Read every non-empty document of a YAML (or JSON) manifest file.
fn load_manifests(path: &Path, max_bytes: usize) -> Result<Vec<serde_json::Value>> {
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if meta.len() > max_bytes as u64 {
        bail!("{} is {} bytes; limit is {} (MCS_MAX_MANIFEST_BYTES)", path.display(), meta.len(), max_bytes);
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut docs = Vec::new();
    for (i, doc) in serde_yaml::Deserializer::from_str(&text).enumerate() {
        let value = serde_json::Value::deserialize(doc)
            .with_context(|| format!("parsing document {} of {}", i + 1, path.display()))?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    debug!(path = %path.display(), documents = docs.len(), "manifests loaded");
    Ok(docs)
}

/// Decode every document in `path`, placing objects that omit a namespace in
/// the request namespace.
fn decode_all(scheme: &Scheme, path: &Path, max_bytes: usize, namespace: Option<&str>) -> Result<Vec<AnyObject>> {
    load_manifests(path, max_bytes)?
        .into_iter()
        .map(|v| {
            let obj = scheme.decode(v).map_err(|e| anyhow!("{}: {}", path.display(), e))?;
            Ok(with_request_namespace(obj, namespace))
        })
        .collect()
}

fn with_request_namespace(mut obj: AnyObject, namespace: Option<&str>) -> AnyObject {
    let Some(ns) = namespace.filter(|ns| !ns.is_empty()) else { return obj };
    let meta = match &mut obj {
        AnyObject::ServiceExport(o) => &mut o.metadata,
        AnyObject::ServiceImport(o) => &mut o.metadata,
    };
    if meta.namespace.as_deref().map_or(true, str::is_empty) {
        meta.namespace = Some(ns.to_string());
    }
    obj
}

fn set_defaults(obj: &mut AnyObject, cfg: &AdmissionConfig) {
    let d = cfg.defaulting();
    match obj {
        AnyObject::ServiceExport(o) => o.set_defaults(&d),
        AnyObject::ServiceImport(o) => o.set_defaults(&d),
    }
}

fn validate(obj: &AnyObject) -> ErrorList {
    match obj {
        AnyObject::ServiceExport(o) => validate_service_export(o),
        AnyObject::ServiceImport(o) => validate_service_import(o),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Applied {
    kind: &'static str,
    namespace: Option<String>,
    name: String,
    outcome: ApplyOutcome,
    generation: Option<i64>,
    resource_version: Option<String>,
}

#[derive(Debug, Serialize)]
struct Failure<'a> {
    code: u16,
    reason: &'static str,
    message: String,
    error: &'a ApiError,
}

fn parse_observation(s: &str) -> Result<HeadlessObservation> {
    let (cluster, value) = s.split_once('=').ok_or_else(|| anyhow!("expected cluster=true|false, got {:?}", s))?;
    let headless = bool::from_str(value.trim()).with_context(|| format!("headless value for {:?}", cluster))?;
    if cluster.trim().is_empty() {
        bail!("empty cluster name in {:?}", s);
    }
    Ok(HeadlessObservation::new(cluster.trim(), headless))
}

fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let cfg = AdmissionConfig::from_env().context("reading admission config")?;
    debug!(config = ?cfg, "admission config");

    let ns = cli.namespace.as_deref();
    match cli.command {
        Commands::Default { file } => {
            let scheme = Scheme::multicluster();
            let mut objs = decode_all(&scheme, &file, cfg.max_manifest_bytes, ns)?;
            for obj in objs.iter_mut() {
                set_defaults(obj, &cfg);
            }
            match cli.output {
                Output::Human => {
                    for obj in &objs {
                        println!("---");
                        print!("{}", serde_yaml::to_string(obj)?);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&objs)?),
            }
        }
        Commands::Validate { file } => {
            let scheme = Scheme::multicluster();
            let mut invalid = 0usize;
            let mut report = Vec::new();
            for mut obj in decode_all(&scheme, &file, cfg.max_manifest_bytes, ns)? {
                set_defaults(&mut obj, &cfg);
                let errs = validate(&obj);
                if !errs.is_empty() {
                    invalid += 1;
                }
                match cli.output {
                    Output::Human => {
                        if errs.is_empty() {
                            println!("{} {}: valid", obj.kind(), obj.key());
                        } else {
                            println!("{} {}: {} error(s)", obj.kind(), obj.key(), errs.len());
                            for e in &errs {
                                println!("  {}", e);
                            }
                        }
                    }
                    Output::Json => report.push(serde_json::json!({
                        "kind": obj.kind(),
                        "key": obj.key(),
                        "errors": errs,
                    })),
                }
            }
            if cli.output == Output::Json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            if invalid > 0 {
                bail!("{} invalid object(s) in {}", invalid, file.display());
            }
        }
        Commands::Apply { files } => {
            let mc = Multicluster::in_memory(&cfg);
            let mut applied = Vec::new();
            for file in &files {
                for obj in decode_all(&mc.scheme, file, cfg.max_manifest_bytes, ns)? {
                    let kind = obj.kind();
                    match mc.apply(obj) {
                        Ok((stored, outcome)) => {
                            let key = stored.key();
                            info!(kind, key = %key, ?outcome, "applied");
                            let row = Applied {
                                kind,
                                namespace: key.namespace,
                                name: key.name,
                                outcome,
                                generation: stored.generation(),
                                resource_version: stored.resource_version().map(str::to_string),
                            };
                            if cli.output == Output::Human {
                                println!(
                                    "{} {}/{} {} (generation {}, resourceVersion {})",
                                    row.kind,
                                    row.namespace.as_deref().unwrap_or("-"),
                                    row.name,
                                    match row.outcome { ApplyOutcome::Created => "created", ApplyOutcome::Updated => "updated" },
                                    row.generation.unwrap_or(0),
                                    row.resource_version.as_deref().unwrap_or("")
                                );
                            }
                            applied.push(row);
                        }
                        Err(e) => {
                            error!(kind, code = e.code(), error = %e, "apply failed");
                            if cli.output == Output::Json {
                                let failure = Failure { code: e.code(), reason: e.reason(), message: e.to_string(), error: &e };
                                println!("{}", serde_json::to_string_pretty(&failure)?);
                            }
                            return Err(anyhow!(e).context(format!("applying {}", file.display())));
                        }
                    }
                }
            }
            if cli.output == Output::Json {
                println!("{}", serde_json::to_string_pretty(&applied)?);
            }
        }
        Commands::Headless { observations } => {
            let obs = observations.iter().map(|s| parse_observation(s)).collect::<Result<Vec<_>>>()?;
            let cond = headless_condition(&obs);
            let ty = import_type(&obs);
            match cli.output {
                Output::Human => {
                    if let Some(c) = &cond {
                        println!("Headless={} reason={}", c.status, c.reason.as_deref().unwrap_or(""));
                        if let Some(m) = &c.message {
                            println!("  {}", m);
                        }
                    }
                    match ty {
                        Some(t) => println!("type: {:?}", t),
                        None => println!("type: <unresolved>"),
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "condition": cond, "type": ty }))?),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_parsing() {
        let o = parse_observation("east=true").unwrap();
        assert_eq!(o, HeadlessObservation::new("east", true));
        assert!(parse_observation("east").is_err());
        assert!(parse_observation("east=maybe").is_err());
        assert!(parse_observation("=false").is_err());
    }

    #[test]
    fn multi_document_manifests() {
        let dir = std::env::temp_dir().join(format!("mcsctl-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("objs.yaml");
        std::fs::write(
            &path,
            "apiVersion: multicluster.k8s.io/v1alpha1\nkind: ServiceExport\nmetadata: {namespace: prod, name: web}\n---\n---\napiVersion: multicluster.k8s.io/v1alpha1\nkind: ServiceImport\nmetadata: {namespace: prod, name: web}\nspec:\n  ports: [{port: 80}]\n",
        )
        .unwrap();
        let objs = decode_all(&Scheme::multicluster(), &path, 1024 * 1024, None).unwrap();
        assert_eq!(objs.iter().map(|o| o.kind()).collect::<Vec<_>>(), vec!["ServiceExport", "ServiceImport"]);
        assert!(load_manifests(&path, 16).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn request_namespace_fills_only_missing_namespaces() {
        let dir = std::env::temp_dir().join(format!("mcsctl-ns-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("objs.yaml");
        std::fs::write(
            &path,
            "apiVersion: multicluster.k8s.io/v1alpha1\nkind: ServiceExport\nmetadata: {name: web}\n---\napiVersion: multicluster.k8s.io/v1alpha1\nkind: ServiceImport\nmetadata: {namespace: \"\", name: web}\nspec:\n  ports: [{port: 80}]\n---\napiVersion: multicluster.k8s.io/v1alpha1\nkind: ServiceExport\nmetadata: {namespace: staging, name: api}\n",
        )
        .unwrap();
        let cfg = AdmissionConfig::default();
        let mut objs = decode_all(&Scheme::multicluster(), &path, 1024 * 1024, Some("prod")).unwrap();
        let namespaces: Vec<Option<String>> = objs.iter().map(|o| o.key().namespace).collect();
        assert_eq!(namespaces, vec![Some("prod".into()), Some("prod".into()), Some("staging".into())]);

        // The same objects pass validation that would reject them without --ns.
        for obj in objs.iter_mut() {
            set_defaults(obj, &cfg);
            assert!(validate(obj).is_empty(), "{}: {}", obj.key(), validate(obj));
        }
        let mut bare = decode_all(&Scheme::multicluster(), &path, 1024 * 1024, None).unwrap().remove(0);
        set_defaults(&mut bare, &cfg);
        assert!(!validate(&bare).is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
