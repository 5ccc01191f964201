//! Release Control CLI
//!
//! Administrative and diagnostic front end over a persisted state file.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use release_control::{
    access_control::{AccessContext, Decision, Principal},
    config::{AppConfig, LogFormat, load_config},
    directory::{GroupDraft, GroupId, PrincipalId},
    securable::{ObjectId, Securable},
    service::ReleaseControl,
    snapshot::Snapshot,
    taxonomy::{ClassificationDraft, ClassificationId},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status of `check` when access is denied
const EXIT_DENIED: u8 = 2;

/// Release Control - compartmented access decisions
#[derive(Parser, Debug)]
#[command(name = "release-control")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "RELEASE_CONTROL_CONFIG")]
    config: Option<String>,

    /// State file (.json or .toml); overrides store.state_path
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(long)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether a principal may access an object
    Check(CheckArgs),

    /// Show the effective (inherited) restrictions of an object
    Effective { object: ObjectId },

    /// Show every group a principal belongs to, ancestors included
    Closure { principal: String },

    /// Manage the classification taxonomy
    #[command(subcommand)]
    Classification(ClassificationCommand),

    /// Manage groups
    #[command(subcommand)]
    Group(GroupCommand),

    /// Manage direct memberships
    #[command(subcommand)]
    Member(MemberCommand),

    /// Inspect securable objects
    #[command(subcommand)]
    Object(ObjectCommand),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Principal id
    #[arg(short, long)]
    principal: String,

    /// Role held by the principal (repeatable)
    #[arg(short, long = "role")]
    roles: Vec<String>,

    /// Direct group supplied by the identity layer (repeatable); replaces stored memberships
    #[arg(short, long = "group")]
    groups: Vec<GroupId>,

    /// Object id
    object: ObjectId,
}

#[derive(Subcommand, Debug)]
enum ClassificationCommand {
    /// List classifications
    List,
    /// Add a classification
    Add {
        title: String,
        #[arg(long, default_value = "")]
        abbreviation: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        #[arg(long, default_value = "")]
        color: String,
        #[arg(long)]
        parent: Option<ClassificationId>,
        /// Make this the default classification
        #[arg(long)]
        default: bool,
    },
    /// Move a classification; omit --parent to make it a root
    Reparent {
        id: ClassificationId,
        #[arg(long)]
        parent: Option<ClassificationId>,
    },
    /// Delete an unreferenced leaf classification
    Delete { id: ClassificationId },
    /// Make a root classification the default
    SetDefault { id: ClassificationId },
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// List groups
    List {
        /// Include hidden groups
        #[arg(long)]
        all: bool,
    },
    /// Add a group
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        parent: Option<GroupId>,
        /// Leave out of user-facing pickers
        #[arg(long)]
        hidden: bool,
        /// Make this the default group
        #[arg(long)]
        default: bool,
    },
    /// Move a group; omit --parent to make it a root
    Reparent {
        id: GroupId,
        #[arg(long)]
        parent: Option<GroupId>,
    },
    /// Delete an empty, unreferenced leaf group
    Delete { id: GroupId },
    /// Make a group the default
    SetDefault { id: GroupId },
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    /// Assign a principal directly to a group
    Assign { group: GroupId, principal: String },
    /// Remove a direct membership
    Remove { group: GroupId, principal: String },
}

#[derive(Subcommand, Debug)]
enum ObjectCommand {
    /// List every object
    List,
}

fn init_logging(config: &AppConfig, level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(&config.logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn open(config: &AppConfig, state: &Path) -> anyhow::Result<ReleaseControl> {
    let snapshot = Snapshot::load_or_default(state)
        .with_context(|| format!("reading {}", state.display()))?;
    ReleaseControl::open(config, snapshot)
        .inspect_err(|e| error!(error = %e, "Invalid state file"))
        .with_context(|| format!("loading {}", state.display()))
}

fn save(control: &ReleaseControl, state: &Path) -> anyhow::Result<()> {
    control
        .snapshot()?
        .save(state)
        .with_context(|| format!("writing {}", state.display()))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Every stored object, grouped by table
fn object_listing(control: &ReleaseControl) -> anyhow::Result<serde_json::Value> {
    let (documents, files, objects) = control.objects().records()?;
    Ok(serde_json::json!({
        "documents": documents,
        "files": files,
        "objects": objects,
    }))
}

fn join_ids<T: std::fmt::Display>(ids: impl IntoIterator<Item = T>) -> String {
    let ids: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
    format!("[{}]", ids.join(", "))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config, cli.log_level.as_deref());

    let state = cli
        .state
        .clone()
        .unwrap_or_else(|| config.store.state_path.clone());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        state = %state.display(),
        "Starting release-control"
    );

    let control = open(&config, &state)?;

    match cli.command {
        Command::Check(args) => {
            let principal = args
                .roles
                .into_iter()
                .fold(Principal::new(args.principal), Principal::with_role);
            let ctx = if args.groups.is_empty() {
                AccessContext::new(principal)
            } else {
                AccessContext::with_memberships(principal, args.groups)
            };
            let decision = control.check_with_context(&ctx, args.object)?;
            if cli.json {
                print_json(&decision)?;
            } else {
                println!("{}", decision);
            }
            if let Decision::Deny(_) = decision {
                return Ok(ExitCode::from(EXIT_DENIED));
            }
        }

        Command::Effective { object } => {
            let effective = control.resolve_effective(object)?;
            if cli.json {
                print_json(&effective)?;
            } else {
                println!("classification: {}", effective.classification_id);
                println!("eyes_only:      {}", join_ids(&effective.eyes_only));
                println!("releasable_to:  {}", join_ids(&effective.releasable_to));
            }
        }

        Command::Closure { principal } => {
            let closure = control.closure(&PrincipalId::from(principal))?;
            if cli.json {
                print_json(&*closure)?;
            } else {
                println!("{}", join_ids(closure.iter()));
            }
        }

        Command::Classification(command) => match command {
            ClassificationCommand::List => {
                let all = control.taxonomy().list()?;
                if cli.json {
                    print_json(&all)?;
                } else {
                    for c in all {
                        let parent = c.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
                        let default = if c.is_default { " (default)" } else { "" };
                        println!(
                            "{:>4}  {:<8} {:<6} {}{}",
                            c.id.get(),
                            c.abbreviation,
                            parent,
                            c.title,
                            default
                        );
                    }
                }
            }
            ClassificationCommand::Add {
                title,
                abbreviation,
                subtitle,
                color,
                parent,
                default,
            } => {
                let draft = ClassificationDraft {
                    title,
                    subtitle,
                    abbreviation,
                    color,
                    parent,
                    is_default: default,
                };
                let created = control.create_classification(draft)?;
                save(&control, &state)?;
                println!("{}", created.id);
            }
            ClassificationCommand::Reparent { id, parent } => {
                control.reparent_classification(id, parent)?;
                save(&control, &state)?;
            }
            ClassificationCommand::Delete { id } => {
                control.delete_classification(id)?;
                save(&control, &state)?;
            }
            ClassificationCommand::SetDefault { id } => {
                control.set_default_classification(id)?;
                save(&control, &state)?;
            }
        },

        Command::Group(command) => match command {
            GroupCommand::List { all } => {
                let groups = if all {
                    control.directory().list()?
                } else {
                    control.directory().pickable()?
                };
                if cli.json {
                    print_json(&groups)?;
                } else {
                    for g in groups {
                        let parent = g.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
                        let mut flags = Vec::new();
                        if g.is_default {
                            flags.push("default");
                        }
                        if g.hidden {
                            flags.push("hidden");
                        }
                        let flags = if flags.is_empty() {
                            String::new()
                        } else {
                            format!(" ({})", flags.join(", "))
                        };
                        println!("{:>4}  {:<6} {}{}", g.id.get(), parent, g.name, flags);
                    }
                }
            }
            GroupCommand::Add {
                name,
                description,
                parent,
                hidden,
                default,
            } => {
                let draft = GroupDraft {
                    name,
                    description,
                    parent,
                    is_default: default,
                    hidden,
                };
                let created = control.create_group(draft)?;
                save(&control, &state)?;
                println!("{}", created.id);
            }
            GroupCommand::Reparent { id, parent } => {
                control.reparent_group(id, parent)?;
                save(&control, &state)?;
            }
            GroupCommand::Delete { id } => {
                control.delete_group(id)?;
                save(&control, &state)?;
            }
            GroupCommand::SetDefault { id } => {
                control.set_default_group(id)?;
                save(&control, &state)?;
            }
        },

        Command::Member(command) => {
            let changed = match command {
                MemberCommand::Assign { group, principal } => {
                    control.assign_member(group, &PrincipalId::from(principal))?
                }
                MemberCommand::Remove { group, principal } => {
                    control.remove_member(group, &PrincipalId::from(principal))?
                }
            };
            if changed {
                save(&control, &state)?;
            } else {
                println!("unchanged");
            }
        }

        Command::Object(ObjectCommand::List) => {
            if cli.json {
                print_json(&object_listing(&control)?)?;
            } else {
                for object in control.objects().list()? {
                    let classification = object
                        .attributes()
                        .classification
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "inherited".into());
                    println!(
                        "{:>4}  {:<14} {:<10} {}",
                        object.object_id().get(),
                        object.kind().as_str(),
                        classification,
                        object.name()
                    );
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
