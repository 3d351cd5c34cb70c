use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ferrotype_core::model::{InstanceLayout, LayoutItemKind, LayoutOrder, TypeNode};
use ferrotype_core::session::{DwarfSession, DwarfSessionOptions};
use ferrotype_core::{crack, Template, TemplateNode, TypeRegistry};
use ferrotype_utils::{debug, init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingGuard};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Inspect C/C++ debug types, instance layouts and template names.
#[derive(Parser, Debug)]
#[command(name = "ferrotype")]
#[command(version)]
#[command(about = "Inspect C/C++ debug types, instance layouts and template names", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Log format: pretty or json (overrides FERROTYPE_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Parse a type name and print its template tree
    Crack
    {
        /// Type name, e.g. "std::vector<int,std::allocator<int> >"
        name: String,
    },
    /// Check whether a type name matches a pattern (wildcards: ? and ?*)
    Match
    {
        /// Pattern, e.g. "std::vector<?*>"
        pattern: String,
        /// Type name to test
        name: String,
    },
    /// List the named types of a binary
    Types
    {
        /// ELF or Mach-O binary with DWARF debug info
        binary: PathBuf,
        /// Only list names matching this pattern
        pattern: Option<String>,
    },
    /// Print the instance layout of every type matching a name
    Dump
    {
        /// ELF or Mach-O binary with DWARF debug info
        binary: PathBuf,
        /// Type name or pattern
        type_name: String,
        /// Sort items by offset instead of declaration order
        #[arg(long, default_value_t = false)]
        offset_order: bool,
        /// Runtime load address of the image (hex format: 0x1000 or decimal)
        #[arg(long, value_parser = parse_address, default_value = "0")]
        load_address: u64,
    },
    /// Print the byte offset of a dotted member path
    Offset
    {
        /// ELF or Mach-O binary with DWARF debug info
        binary: PathBuf,
        /// Type name or pattern
        type_name: String,
        /// Member path, e.g. "header.flags"
        path: String,
        /// Runtime load address of the image (hex format: 0x1000 or decimal)
        #[arg(long, value_parser = parse_address, default_value = "0")]
        load_address: u64,
    },
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match start_logging(cli.log_level, cli.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn start_logging(level: Option<LogLevel>, format: Option<LogFormat>) -> CliResult<LoggingGuard>
{
    let guard = if level.is_none() && format.is_none() {
        init_logging()?
    } else {
        init_logging_with_level(level.unwrap_or(LogLevel::Warn), format.unwrap_or_default())?
    };
    Ok(guard)
}

fn run_command(command: Commands) -> CliResult<()>
{
    match command {
        Commands::Crack { name } => {
            print_template(&crack(&name), 0);
            Ok(())
        }
        Commands::Match { pattern, name } => {
            let template = Template::new(&pattern)?;
            let matched = template.matches(&name);
            println!("{}", if matched { "match" } else { "no match" });
            if !matched {
                process::exit(2);
            }
            Ok(())
        }
        Commands::Types { binary, pattern } => {
            let session = load(&binary, 0)?;
            let template = pattern.as_deref().map(Template::new).transpose()?;
            let mut names: Vec<&str> = session
                .type_names()
                .filter(|name| template.as_ref().map_or(true, |template| template.matches(name)))
                .collect();
            names.sort_unstable();
            names.dedup();
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Dump {
            binary,
            type_name,
            offset_order,
            load_address,
        } => {
            let (registry, nodes) = resolve_matching(&binary, &type_name, load_address)?;
            let order = if offset_order {
                LayoutOrder::Offset
            } else {
                LayoutOrder::Declaration
            };
            for node in nodes {
                let layout = registry.layout(&node, order)?;
                print_layout(&registry, &node, &layout)?;
            }
            Ok(())
        }
        Commands::Offset {
            binary,
            type_name,
            path,
            load_address,
        } => {
            let (registry, nodes) = resolve_matching(&binary, &type_name, load_address)?;
            for node in nodes {
                let offset = registry.find_member_offset(&node, &path)?;
                println!("{}::{path} = {offset:#x} ({offset})", registry.name(&node)?);
            }
            Ok(())
        }
    }
}

fn load(binary: &Path, load_address: u64) -> CliResult<DwarfSession>
{
    Ok(DwarfSession::load(binary, DwarfSessionOptions { load_address })?)
}

/// Resolve every UDT matching `pattern`, dropping structural duplicates
/// (the same class emitted by several compilation units).
fn resolve_matching(
    binary: &Path,
    pattern: &str,
    load_address: u64,
) -> CliResult<(TypeRegistry<DwarfSession>, Vec<Arc<TypeNode>>)>
{
    let session = load(binary, load_address)?;
    let module = session.module();
    let ids = session.find_types(pattern)?;
    let registry = TypeRegistry::new(session);

    let mut nodes: Vec<Arc<TypeNode>> = Vec::new();
    for id in ids {
        let node = registry.strip_typedefs(registry.resolve(module, id)?)?;
        if !node.is_udt() {
            debug!(id = %id, kind = node.kind_name(), "skipping non-UDT match");
            continue;
        }
        let mut duplicate = false;
        for seen in &nodes {
            if registry.structurally_equal(seen, &node)? {
                duplicate = true;
                break;
            }
        }
        if !duplicate {
            nodes.push(node);
        }
    }

    if nodes.is_empty() {
        return Err(format!("no type matching {pattern:?} in {}", binary.display()).into());
    }
    Ok((registry, nodes))
}

fn print_template(node: &TemplateNode, depth: usize)
{
    let indent = "  ".repeat(depth);
    let constness = if node.has_const() { " (const)" } else { "" };
    match node.template_name() {
        Some(name) => {
            println!("{indent}template {name}{constness}");
            for parameter in node.parameters() {
                print_template(parameter, depth + 1);
            }
            if let Some(nested) = node.nested() {
                println!("{indent}  ::");
                print_template(nested, depth + 2);
            }
        }
        None => println!("{indent}{}{constness}", node.full_name()),
    }
}

fn print_layout(registry: &TypeRegistry<DwarfSession>, node: &TypeNode, layout: &InstanceLayout) -> CliResult<()>
{
    let kind = node.as_udt().map_or("type".to_string(), |udt| udt.kind.to_string());
    println!("{kind} {} ({} bytes)", registry.name(node)?, layout.declared_size());

    for item in layout.items() {
        match &item.kind {
            LayoutItemKind::VTable(hit) => {
                let vtable = registry.node(hit.vtable)?;
                println!(
                    "  +{:#06x}  {:<28} {:>5}  {}",
                    item.offset,
                    "<vfptr>",
                    item.size,
                    registry.name(&vtable)?
                );
            }
            LayoutItemKind::Member(member) => {
                let member_type = registry.node(member.member_type)?;
                let label = match member.bitfield {
                    Some(bitfield) => format!("{} : {} @{}", member.name, bitfield.length, bitfield.position),
                    None => member.name.clone(),
                };
                let origin = match member.inherited_from {
                    Some(base) => format!("  (from {})", registry.name(&*registry.node(base)?)?),
                    None => String::new(),
                };
                println!(
                    "  +{:#06x}  {:<28} {:>5}  {}{origin}",
                    item.offset,
                    label,
                    item.size,
                    registry.name(&member_type)?
                );
            }
        }
    }

    if layout.extent() > layout.declared_size() {
        println!("  ! layout extends to {} bytes", layout.extent());
    }
    println!();
    Ok(())
}

fn parse_address(s: &str) -> Result<u64, String>
{
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}
