use anyhow::{Error, Result};
use clap::{Parser, Subcommand};
use log::info;
use ontotree::api::OntologyBrowser;
use ontotree::config::OntologyConfig;
use ontotree::hierarchy::{DisplayNameMode, HierarchyFilter};
use serde::Serialize;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "ontotree.json";

#[derive(Debug, Parser)]
#[command(name = "ontotree")]
#[command(about = "Browse the structure of an RDF ontology")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, default_value = "false", global = true)]
    verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, default_value = "false", global = true)]
    debug: bool,
    /// Browsing configuration file (JSON). Defaults are used when not given.
    #[clap(long, short, global = true)]
    config: Option<PathBuf>,
    /// Output JSON instead of text
    #[clap(long, action, default_value = "false", global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Write a configuration file with default values.
    Init {
        /// Where to write the file, defaults to 'ontotree.json'
        path: Option<PathBuf>,
        /// Overwrite the file if it already exists
        #[clap(long, default_value = "false")]
        overwrite: bool,
    },
    /// Show the active configuration.
    Show,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the class hierarchy as an indented tree
    Tree {
        /// The ontology file
        file: PathBuf,
        /// Include deprecated classes
        #[clap(long, action)]
        show_deprecated: bool,
        /// Hide classes from external namespaces
        #[clap(long, action)]
        hide_external: bool,
        /// Display URI identifiers instead of labels
        #[clap(long, action)]
        identifier: bool,
        /// Only show classes from these namespaces
        #[clap(long, short, num_args = 1..)]
        namespace: Vec<String>,
    },
    /// List the hierarchy nodes as a flat list
    Nodes {
        /// The ontology file
        file: PathBuf,
    },
    /// Print the primary type of one entity, or of every typed entity
    Classify {
        /// The ontology file
        file: PathBuf,
        /// The entity URI; all typed entities when omitted
        uri: Option<String>,
    },
    /// Detect whether an entity is a code list and print its members
    Codelist {
        /// The ontology file
        file: PathBuf,
        /// The entity URI
        entity: String,
    },
    /// List every SKOS concept scheme and collection
    Codelists {
        /// The ontology file
        file: PathBuf,
    },
    /// List namespaces with their class counts
    Namespaces {
        /// The ontology file
        file: PathBuf,
    },
    /// Analyze the namespace composition of the ontology
    Composition {
        /// The ontology file
        file: PathBuf,
        /// The ontology URI, defaults to the owl:Ontology declared in the file
        #[clap(long)]
        ontology_uri: Option<String>,
        /// Treat this namespace as native
        #[clap(long)]
        native: Option<String>,
    },
    /// Show the domains and ranges of a property
    Property {
        /// The ontology file
        file: PathBuf,
        /// The property URI
        uri: String,
    },
    /// List the properties of a class, including inherited ones
    Properties {
        /// The ontology file
        file: PathBuf,
        /// The class URI
        class: String,
    },
    /// Print the prefixed form of a URI using the file's prefixes
    Prefix {
        /// The ontology file
        file: PathBuf,
        /// The URI to shorten
        uri: String,
    },
    /// Manage the browsing configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

pub fn run() -> Result<()> {
    ontotree::api::init_logging();
    let cmd = Cli::parse();
    execute(cmd, &mut std::io::stdout())
}

pub fn run_from_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    run_with_output(args, &mut std::io::stdout())
}

/// Like [`run_from_args`], writing command output to `out`.
pub fn run_with_output<I, T>(args: I, out: &mut dyn Write) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    ontotree::api::init_logging();
    let cmd = Cli::try_parse_from(args).map_err(Error::from)?;
    execute(cmd, out)
}

fn load_config(path: Option<&Path>) -> Result<OntologyConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            OntologyConfig::from_file(path)
        }
        None => Ok(OntologyConfig::default()),
    }
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Loads `file` into a fresh browser under its path as id.
fn open(file: &Path, config: OntologyConfig) -> Result<(OntologyBrowser, String)> {
    let browser = OntologyBrowser::new(config);
    let id = file.display().to_string();
    browser.load_file(&id, file)?;
    Ok((browser, id))
}

fn execute(cmd: Cli, out: &mut dyn Write) -> Result<()> {
    // The RUST_LOG env var is set by `init_logging` if ONTOTREE_LOG is present.
    // CLI flags for verbosity take precedence. If nothing is set, we default to "warn".
    if cmd.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if cmd.verbose {
        std::env::set_var("RUST_LOG", "info");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = env_logger::try_init();

    let mut config = load_config(cmd.config.as_deref())?;
    if (cmd.verbose || cmd.debug) && !cmd.json && !matches!(cmd.command, Commands::Config(_)) {
        writeln!(out, "{}", config)?;
    }

    match cmd.command {
        Commands::Tree {
            file,
            show_deprecated,
            hide_external,
            identifier,
            namespace,
        } => {
            config.show_deprecated |= show_deprecated;
            config.show_external &= !hide_external;
            if identifier {
                config.display_name_mode = DisplayNameMode::Identifier;
            }
            let mut filter = HierarchyFilter::from_config(&config);
            if !namespace.is_empty() {
                filter = filter.with_namespaces(namespace);
            }
            let (browser, id) = open(&file, config.clone())?;
            let forest = browser.hierarchy_with(&id, &config, &filter)?;
            if cmd.json {
                return write_json(out, &forest);
            }
            for root in &forest {
                for (depth, node) in root.walk() {
                    writeln!(out, "{}{}", "  ".repeat(depth), node.display_name)?;
                }
            }
        }
        Commands::Nodes { file } => {
            let (browser, id) = open(&file, config)?;
            let nodes = browser.hierarchy_nodes(&id)?;
            if cmd.json {
                return write_json(out, &nodes);
            }
            for node in nodes {
                let mut flags = vec![];
                if node.is_external {
                    flags.push("external");
                }
                if node.is_deprecated {
                    flags.push("deprecated");
                }
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    node.label,
                    node.entity_type,
                    node.uri,
                    flags.join(",")
                )?;
            }
        }
        Commands::Classify { file, uri } => {
            let (browser, id) = open(&file, config)?;
            let mut entities = browser.classified(&id)?;
            if let Some(uri) = uri {
                entities.retain(|e| e.uri() == uri);
                if entities.is_empty() {
                    return Err(anyhow::anyhow!("No typed entity {} in {}", uri, id));
                }
            }
            if cmd.json {
                return write_json(out, &entities);
            }
            for entity in entities {
                writeln!(out, "{}\t{}", entity.uri(), entity.primary_type)?;
            }
        }
        Commands::Codelist { file, entity } => {
            let (browser, id) = open(&file, config)?;
            let code_list = browser.code_list(&id, &entity)?;
            if cmd.json {
                return write_json(out, &code_list);
            }
            match code_list {
                Some(list) => {
                    writeln!(
                        out,
                        "{} ({}, {} members)",
                        list.label.as_deref().unwrap_or(&list.uri),
                        list.pattern,
                        list.member_count
                    )?;
                    for member in list.members {
                        match member.notation {
                            Some(notation) => {
                                writeln!(out, "  [{}] {}\t{}", notation, member.label, member.uri)?
                            }
                            None => writeln!(out, "  {}\t{}", member.label, member.uri)?,
                        }
                    }
                }
                None => writeln!(out, "{} is not a code list", entity)?,
            }
        }
        Commands::Codelists { file } => {
            let (browser, id) = open(&file, config)?;
            let lists = browser.code_lists(&id)?;
            if cmd.json {
                return write_json(out, &lists);
            }
            for list in lists {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    list.label, list.pattern, list.member_count, list.uri
                )?;
            }
        }
        Commands::Namespaces { file } => {
            let (browser, id) = open(&file, config)?;
            let namespaces = browser.namespaces(&id)?;
            if cmd.json {
                return write_json(out, &namespaces);
            }
            for ns in namespaces {
                writeln!(
                    out,
                    "{}{}\t{}\t{}",
                    if ns.selected { "* " } else { "" },
                    ns.class_count,
                    ns.prefix.as_deref().unwrap_or("-"),
                    ns.namespace
                )?;
            }
        }
        Commands::Composition {
            file,
            ontology_uri,
            native,
        } => {
            if ontology_uri.is_some() {
                config.ontology_uri = ontology_uri;
            }
            if native.is_some() {
                config.native_namespace = native;
            }
            let (browser, id) = open(&file, config)?;
            let composition = browser.composition(&id)?;
            if cmd.json {
                return write_json(out, &composition);
            }
            writeln!(out, "Ontology type: {}", composition.ontology_type)?;
            writeln!(
                out,
                "Native namespace: {}",
                composition.native_namespace.as_deref().unwrap_or("(none)")
            )?;
            writeln!(
                out,
                "Native classes: {} of {} ({:.1}%)",
                composition.native_class_count,
                composition.total_classes,
                composition.native_class_pct * 100.0
            )?;
            writeln!(out, "Properties: {}", composition.total_properties)?;
            writeln!(out, "Triples: {}", composition.total_triples)?;
            writeln!(out, "Namespaces:")?;
            for stats in &composition.namespace_stats {
                writeln!(
                    out,
                    "  {}{}\t{} classes\t{} properties\t{}",
                    if stats.is_native { "* " } else { "" },
                    stats.label,
                    stats.class_count,
                    stats.property_count,
                    stats.namespace
                )?;
            }
        }
        Commands::Property { file, uri } => {
            let (browser, id) = open(&file, config)?;
            let property = browser.property_info(&id, &uri)?;
            if cmd.json {
                return write_json(out, &property);
            }
            writeln!(out, "{} ({})", property.label, property.property_type)?;
            for domain in &property.domains {
                writeln!(out, "  domain: {}\t{}", domain.label, domain.uri)?;
            }
            for range in &property.ranges {
                writeln!(out, "  range: {}\t{}", range.label, range.uri)?;
            }
        }
        Commands::Properties { file, class } => {
            let (browser, id) = open(&file, config)?;
            let properties = browser.class_properties(&id, &class)?;
            if cmd.json {
                return write_json(out, &properties);
            }
            for property in &properties.domain_of {
                writeln!(out, "{}\t{}", property.label, property.property_type)?;
            }
            for group in &properties.inherited {
                writeln!(out, "from {}:", group.from_class.label)?;
                for property in &group.properties {
                    writeln!(out, "  {}\t{}", property.label, property.property_type)?;
                }
            }
            if !properties.range_of.is_empty() {
                writeln!(out, "range of:")?;
                for property in &properties.range_of {
                    writeln!(out, "  {}\t{}", property.label, property.property_type)?;
                }
            }
        }
        Commands::Prefix { file, uri } => {
            let (browser, id) = open(&file, config)?;
            let name = browser.prefixed_form(&id, &uri)?;
            if cmd.json {
                return write_json(out, &name);
            }
            match name {
                Some(name) => writeln!(out, "{}", name)?,
                None => writeln!(out, "{}", uri)?,
            }
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init { path, overwrite } => {
                let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                if path.exists() && !overwrite {
                    return Err(anyhow::anyhow!(
                        "{} already exists. Use --overwrite to replace it.",
                        path.display()
                    ));
                }
                config.save_to_file(&path)?;
                writeln!(out, "Wrote configuration to {}", path.display())?;
            }
            ConfigCommands::Show => {
                if cmd.json {
                    return write_json(out, &config);
                }
                writeln!(out, "{}", config)?;
            }
        },
    }

    Ok(())
}
