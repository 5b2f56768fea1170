use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tether_core::native::NativeQuery;
use tether_core::platform::{create_attachment, default_platform};
use tether_core::probe::probe;
use tether_core::types::{ProcessAccess, ProcessId};
use tether_core::{ProcessAttachment, TetherResult};
use tether_utils::{info, init_logging, init_logging_with_level, LogConfig, LogLevel, LoggingError, LoggingGuard};

/// Attach to Windows processes and report their architecture-correct native state.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version)]
#[command(about = "Attach to Windows processes and report their architecture-correct native state", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG): error, warn, info, debug, trace
    #[arg(long, global = true, value_parser = LogLevel::from_str)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Show the OS architecture and whether this process runs under WOW64
    Probe,
    /// Attach to a running process by PID
    Attach
    {
        /// Process ID (PID) to attach to
        pid: u32,
        /// Access mask: hex (0x1fffff), decimal, or names joined with '|' or ','
        /// (all, default, query, query-limited, vm-read, vm-write, ...)
        #[arg(short, long, default_value = "default", value_parser = parse_access)]
        access: ProcessAccess,
    },
    /// Attach to this process
    #[command(name = "self")]
    SelfAttach,
}

fn main()
{
    let cli = Cli::parse();

    // Keep the guard until exit so file logs are flushed
    let _logging = match init(cli.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init(level: Option<LogLevel>) -> Result<LoggingGuard, LoggingError>
{
    match level {
        Some(level) => init_logging_with_level(level, LogConfig::from_env()?.format),
        None => init_logging(),
    }
}

fn run_command(command: Commands) -> TetherResult<()>
{
    match command {
        Commands::Probe => {
            let platform = default_platform()?;
            let arch = probe(platform.as_ref());
            println!("Native architecture: {}", arch.native);
            println!("Controller:          {} (wow64: {})", arch.controller_width, arch.controller_wow64);
            Ok(())
        }
        Commands::Attach { pid, access } => {
            info!("Attaching to process {} with access {}", pid, access);
            let mut attachment = create_attachment()?;
            attachment.open(ProcessId::from(pid), access)?;
            println!("Successfully attached to process {}", pid);
            print_attachment_info(&attachment);
            attachment.close();
            Ok(())
        }
        Commands::SelfAttach => {
            let mut attachment = create_attachment()?;
            let pid = ProcessId::from(process::id());
            attachment.open(pid, ProcessAccess::empty())?;
            println!("Successfully attached to own process {}", pid);
            print_attachment_info(&attachment);
            attachment.close();
            Ok(())
        }
    }
}

fn print_attachment_info(attachment: &ProcessAttachment)
{
    let Some(native) = attachment.native() else {
        println!("Not attached");
        return;
    };

    let barrier = native.barrier();
    println!("\nAttachment:");
    println!("  PID:            {}", attachment.pid());
    if let Some(handle) = attachment.handle() {
        println!("  Handle:         {}", handle);
    }
    println!("  Variant:        {} ({} structures)", native.kind(), native.pointer_width());
    println!("  Barrier:        {:?} (mismatch: {})", barrier.kind, barrier.mismatch);
    println!("  Target:         {} (wow64: {})", barrier.target_width(), barrier.target_wow64);

    println!("\nSecurity:");
    match attachment.dep_policy() {
        Some(policy) => println!(
            "  DEP:            {} (flags: {:?}, permanent: {})",
            attachment.dep_enabled(),
            policy.flags,
            policy.permanent
        ),
        None => println!("  DEP:            {}", attachment.dep_enabled()),
    }
    println!("  Protected:      {}", attachment.is_protected());
    match attachment.extended_flags() {
        Ok(flags) => println!("  Flags:          {:?}", flags),
        Err(e) => println!("  Flags:          unavailable ({})", e),
    }

    println!("\nBasic information:");
    match attachment.basic_information() {
        Ok(basic) => {
            println!("  PEB:            0x{:x}", basic.peb_base_address);
            println!("  Unique PID:     {}", basic.unique_process_id);
            println!("  Parent PID:     {}", basic.inherited_from_unique_process_id);
            println!("  Exit status:    {}", basic.exit_status);
            println!("  Base priority:  {}", basic.base_priority);
        }
        Err(e) => println!("  unavailable ({})", e),
    }
}

/// Parse an access mask from the command line
///
/// Accepts hex (`0x1fffff`), decimal (`1040`), or access right names joined
/// with `|` or `,` (`query|vm-read`). Names match the `PROCESS_*` constants in
/// kebab case (`vm-read`, `query-limited-information`); `all`, `default`,
/// `query`, `query-limited` and `set-limited` are shorthands. Tokens combine
/// with a bitwise or.
fn parse_access(input: &str) -> Result<ProcessAccess, String>
{
    let tokens: Vec<&str> = input
        .split(['|', ','])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err("Access mask is empty. Use a number (0x1fffff) or names (query|vm-read)".to_string());
    }

    let mut access = ProcessAccess::empty();
    for token in tokens {
        access |= parse_access_token(token)?;
    }
    Ok(access)
}

fn parse_access_token(token: &str) -> Result<ProcessAccess, String>
{
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16)
            .map(ProcessAccess::from_bits_retain)
            .map_err(|_| format!("Invalid hex access mask: {token}"));
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        return token
            .parse::<u32>()
            .map(ProcessAccess::from_bits_retain)
            .map_err(|_| format!("Invalid access mask: {token}"));
    }

    let name = match token.to_lowercase().as_str() {
        "query" => "QUERY_INFORMATION".to_string(),
        "query-limited" => "QUERY_LIMITED_INFORMATION".to_string(),
        "set-limited" => "SET_LIMITED_INFORMATION".to_string(),
        other => other.replace('-', "_").to_uppercase(),
    };
    ProcessAccess::from_name(&name).ok_or_else(|| format!("Unknown access right: {token}"))
}
