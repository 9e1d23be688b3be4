use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use po_receipt::host::{ConsoleNotifier, FileHostContext, OperatorPrompt, ScriptedOperator, TerminalOperator};
use po_receipt::remote::SandboxRemote;
use po_receipt::workflow::{validate_identifiers, ReceiptWorkflow, RunReport, MAX_IDENTIFIER_LEN};
use po_receipt::{init_telemetry, ReceiptConfig};

#[derive(Parser)]
#[command(name = "po-receipt")]
#[command(about = "Purchase-order receipt workflow")]
#[command(long_about = "Receives a purchase order line into a warehouse: validates the operator's input, \
                       branches on the item's serial/lot control, submits the receipt transaction and \
                       rolls back provisional equipment records when anything fails.")]
struct Cli {
    /// Configuration file (defaults to ./po-receipt.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one receipt against a sandbox remote
    Run {
        /// Host screen captured as TOML (session and field values)
        #[arg(long)]
        context: PathBuf,
        /// Sandbox fixture (JSON) answering the remote programs
        #[arg(long)]
        fixture: PathBuf,
        /// Scripted operator answers (TOML); prompts on the terminal when omitted
        #[arg(long)]
        answers: Option<PathBuf>,
    },
    /// Validate serial or lot identifiers without receiving anything
    CheckIds {
        /// Identifiers in entry order
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    ReceiptConfig::load_env_file()?;

    match cli.command {
        None => {
            show_usage();
            Ok(())
        }
        Some(Commands::Run {
            context,
            fixture,
            answers,
        }) => {
            let config = ReceiptConfig::load(cli.config.as_deref())?;
            init_telemetry(&config.observability)?;
            tokio::runtime::Runtime::new()?.block_on(async {
                run_command(&config, &context, &fixture, answers.as_deref()).await
            })
        }
        Some(Commands::CheckIds { ids }) => check_ids_command(&ids),
        Some(Commands::Config) => {
            let config = ReceiptConfig::load(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn show_usage() {
    println!("📦 po-receipt: purchase-order receipt workflow");
    println!();
    println!("   po-receipt run --context screen.toml --fixture sandbox.json [--answers answers.toml]");
    println!("   po-receipt check-ids SN-001 SN-002 ...");
    println!("   po-receipt config");
}

async fn run_command(
    config: &ReceiptConfig,
    context: &Path,
    fixture: &Path,
    answers: Option<&Path>,
) -> Result<()> {
    let host = FileHostContext::from_file(context)
        .with_context(|| format!("reading host context {}", context.display()))?;
    let remote = SandboxRemote::from_file(fixture)
        .with_context(|| format!("reading sandbox fixture {}", fixture.display()))?;
    let operator: Arc<dyn OperatorPrompt> = match answers {
        Some(path) => Arc::new(
            ScriptedOperator::from_file(path)
                .with_context(|| format!("reading operator answers {}", path.display()))?,
        ),
        None => Arc::new(TerminalOperator::stdio()),
    };

    let workflow = ReceiptWorkflow::new(
        Arc::new(remote),
        Arc::new(host),
        operator,
        Arc::new(ConsoleNotifier::new()),
        config,
    );

    let report = workflow.run().await;
    print_report(&report);

    if !report.is_success() {
        bail!("receipt did not complete (run {})", report.correlation_id);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("🔎 Run {}", report.correlation_id);
    if let Ok(outcome) = &report.outcome {
        println!(
            "   Transaction {} finished with status {}",
            outcome.transaction, outcome.status
        );
        for line in &outcome.lines {
            let identifier = line
                .identifier
                .as_ref()
                .map(|id| id.value().to_string())
                .unwrap_or_else(|| "-".to_string());
            match line.expiration {
                Some(expiration) => println!("   • {} × {identifier} (expires {expiration})", line.quantity.normalize()),
                None => println!("   • {} × {identifier}", line.quantity.normalize()),
            }
        }
    }

    if let Some(compensation) = &report.compensation {
        println!(
            "   Rolled back {} provisional equipment record(s)",
            compensation.succeeded()
        );
        for (record, reason) in &compensation.failed {
            println!(
                "   ⚠️  {}/{} could not be deleted: {reason}",
                record.item_number, record.serial
            );
        }
    }
}

fn check_ids_command(ids: &[String]) -> Result<()> {
    let violations = validate_identifiers(ids);
    if violations.is_empty() {
        println!("✅ {} identifier(s) valid", ids.len());
        return Ok(());
    }

    println!("❌ {} problem(s) found:", violations.len());
    for violation in &violations {
        println!("   • {violation}");
    }
    println!("   Identifiers use letters, digits and '-', at most {MAX_IDENTIFIER_LEN} characters, no repeats.");
    bail!("invalid identifiers");
}
