use clap::{Parser, Subcommand};
use colored::Colorize;
use covenant_core::{ContractSummary, ContractedType, Error, Instance, Value, View};
use std::process;
use tracing_subscriber::EnvFilter;

mod stacks;

use stacks::{Implementation, StackState};

/// Covenant - runtime design-by-contract
///
/// Run call scripts against the bundled contracted stacks and inspect their
/// composed contracts.
#[derive(Parser)]
#[command(name = "covenant", version, about, long_about = None)]
struct Cli {
    /// Log registration and call phases to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a call script, e.g. `push 2 push 4 pop`
    Run {
        /// Method names, each followed by its arguments
        #[arg(required = true, allow_negative_numbers = true)]
        calls: Vec<String>,
        /// Stack implementation to instantiate
        #[arg(long = "impl", value_enum, default_value = "stack")]
        implementation: Implementation,
        /// Skip invariant checks on entry (paranoid off)
        #[arg(long)]
        relaxed: bool,
        /// Call through the raw view, without any contract checks
        #[arg(long)]
        raw: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the linearization and composed contract of a stack
    Inspect {
        /// Stack implementation to inspect
        #[arg(long = "impl", value_enum, default_value = "stack")]
        implementation: Implementation,
        /// Inspect the relaxed (non-paranoid) registration
        #[arg(long)]
        relaxed: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Run {
            calls,
            implementation,
            relaxed,
            raw,
            json,
        } => cmd_run(&calls, implementation, !relaxed, raw, json),
        Commands::Inspect {
            implementation,
            relaxed,
            json,
        } => cmd_inspect(implementation, !relaxed, json),
        Commands::Version => {
            println!("covenant {}", env!("CARGO_PKG_VERSION"));
            0
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── Commands ──────────────────────────────────────────────

fn register(
    implementation: Implementation,
    paranoid: bool,
) -> Result<ContractedType<StackState>, i32> {
    implementation.definition(paranoid).register().map_err(|e| {
        eprintln!("{} {}", "error:".red().bold(), e);
        exit_code(&e)
    })
}

fn cmd_run(
    calls: &[String],
    implementation: Implementation,
    paranoid: bool,
    raw: bool,
    json: bool,
) -> i32 {
    let ty = match register(implementation, paranoid) {
        Ok(ty) => ty,
        Err(code) => return code,
    };
    let script = match parse_script(&ty, calls) {
        Ok(script) => script,
        Err(message) => {
            eprintln!("{} {}", "error:".red().bold(), message);
            return 2;
        }
    };

    let instantiated = if raw {
        ty.raw().instantiate(&[])
    } else {
        ty.instantiate(&[])
    };
    let mut instance = match instantiated {
        Ok(instance) => instance,
        Err(e) => return report_failure(&e, json, &[], None),
    };

    let mut completed = Vec::new();
    for (method, args) in &script {
        match instance.call(method, args) {
            Ok(ret) => {
                if !json {
                    println!("{} {} → {}", "✓".green(), render_call(method, args), ret);
                }
                completed.push(serde_json::json!({
                    "method": method,
                    "args": args,
                    "result": ret,
                }));
            }
            Err(e) => {
                if !json {
                    println!("{} {}", "✗".red(), render_call(method, args));
                }
                return report_failure(&e, json, &completed, Some(&instance));
            }
        }
    }

    if json {
        let output = serde_json::json!({
            "type": instance.type_name(),
            "view": instance.view(),
            "ok": true,
            "calls": completed,
            "state": state_json(&instance),
            "violation": null,
        });
        print_json(&output);
    } else {
        println!(
            "{} {} calls completed on {} ({} view), stack: {}",
            "ok:".green().bold(),
            completed.len(),
            instance.type_name(),
            instance.view(),
            Value::Array(instance.core().arr.clone())
        );
    }
    0
}

fn cmd_inspect(implementation: Implementation, paranoid: bool, json: bool) -> i32 {
    let ty = match register(implementation, paranoid) {
        Ok(ty) => ty,
        Err(code) => return code,
    };
    let summary = ty.summary();
    if json {
        print_json(&serde_json::json!(summary));
    } else {
        print_summary(&summary);
    }
    0
}

// ── Script parsing ────────────────────────────────────────

/// Split `push 1 push 2 pop` into calls using each method's arity
fn parse_script(
    ty: &ContractedType<StackState>,
    tokens: &[String],
) -> Result<Vec<(String, Vec<Value>)>, String> {
    let mut script = Vec::new();
    let mut tokens = tokens.iter();
    while let Some(method) = tokens.next() {
        let contract = ty
            .contract()
            .method(method)
            .ok_or_else(|| format!("{} has no method '{}'", ty.name(), method))?;
        let args = (0..contract.arity())
            .map(|_| {
                tokens
                    .next()
                    .map(|t| Value::parse_lenient(t))
                    .ok_or_else(|| {
                        format!("'{}' takes {} argument(s)", method, contract.arity())
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        script.push((method.clone(), args));
    }
    Ok(script)
}

// ── Output ────────────────────────────────────────────────

fn exit_code(e: &Error) -> i32 {
    match e {
        Error::Violation(_) | Error::Linearization(_) | Error::Definition(_) => 1,
        _ => 2,
    }
}

fn report_failure(
    e: &Error,
    json: bool,
    completed: &[serde_json::Value],
    instance: Option<&Instance<StackState>>,
) -> i32 {
    if json {
        let output = serde_json::json!({
            "type": instance.map(Instance::type_name),
            "view": instance.map(Instance::view).unwrap_or(View::Contracted),
            "ok": false,
            "calls": completed,
            "state": instance.map(state_json),
            "violation": e.violation(),
            "error": e.to_string(),
        });
        print_json(&output);
    } else if let Some(violation) = e.violation() {
        eprintln!("{} {}", "violation:".red().bold(), violation);
        for rejected in &violation.rejected {
            eprintln!(
                "  {} also rejected by {}: {}",
                "·".dimmed(),
                rejected.origin,
                rejected.value
            );
        }
    } else {
        eprintln!("{} {}", "error:".red().bold(), e);
    }
    exit_code(e)
}

fn render_call(method: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("{}({})", method, args.join(", "))
}

fn state_json(instance: &Instance<StackState>) -> serde_json::Value {
    let core = instance.core();
    serde_json::json!({
        "items": core.arr,
        "size": core.size,
    })
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
    }
}

fn print_summary(summary: &ContractSummary) {
    println!("{} {}", "type".bold(), summary.type_name);
    println!("  linearization: {}", summary.linearization.join(" → "));
    println!("  paranoid: {}", summary.paranoid);
    println!("  invariants: {}", or_none(&summary.invariants));
    for method in &summary.methods {
        println!(
            "  {} {}/{} (impl: {})",
            "method".bold(),
            method.name,
            method.arity,
            method.implemented_by.as_deref().unwrap_or("abstract")
        );
        println!("    requires: {}", or_none(&method.requires));
        println!("    ensures:  {}", or_none(&method.ensures));
    }
    println!("  fingerprint: {}", summary.fingerprint);
}

fn or_none(origins: &[String]) -> String {
    if origins.is_empty() {
        "-".to_string()
    } else {
        origins.join(", ")
    }
}
