use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use litemodel_core::{ColumnDefinition, MigrationDefinition, Migrator, Storage, Store, validate_identifier};
use litemodel_sqlite::{DatabaseLocation, SqliteStorage, StoreConfig, connect};
use tracing::Level;

mod plan;

use plan::MigrationPlan;

#[derive(Debug, Parser)]
#[command(name = "litemodel")]
#[command(about = "Apply declarative migration plans to SQLite databases", version)]
struct Cli {
    /// Log every SQL statement to stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations from a plan.
    Migrate(MigrateArgs),
    /// Show applied and pending migration versions.
    Status(StatusArgs),
    /// Print the introspected column definitions of a table.
    Columns(ColumnsArgs),
}

#[derive(Debug, Args)]
struct DatabaseArgs {
    /// Database file path, or `:memory:`.
    #[arg(long, required_unless_present = "config", conflicts_with = "config")]
    db: Option<String>,
    /// Store configuration YAML file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(flatten)]
    database: DatabaseArgs,
    /// Migration plan YAML file.
    #[arg(long)]
    plan: PathBuf,
    /// Print the DDL of each pending migration without applying it.
    #[arg(long)]
    dry_run: bool,
    /// Print nothing on success.
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[command(flatten)]
    database: DatabaseArgs,
    /// Migration plan YAML file.
    #[arg(long)]
    plan: PathBuf,
    /// Print the status as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ColumnsArgs {
    #[command(flatten)]
    database: DatabaseArgs,
    /// Table to introspect.
    #[arg(long)]
    table: String,
}

fn main() {
    let cli = Cli::parse();
    let quiet = matches!(&cli.command, Command::Migrate(args) if args.quiet);
    setup_logging(cli.verbose, quiet);

    let result = match cli.command {
        Command::Migrate(args) => run_migrate(args, cli.verbose),
        Command::Status(args) => run_status(args, cli.verbose),
        Command::Columns(args) => run_columns(args, cli.verbose),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// migrate command
// ---------------------------------------------------------------------------

fn run_migrate(args: MigrateArgs, verbose: bool) -> Result<(), String> {
    let migrations = load_plan(&args.plan)?;
    let store = open_store(&args.database, verbose)?;
    let mut migrator = Migrator::new(&store, migrations).map_err(|e| format!("Failed to initialize migrator: {e}"))?;

    if args.dry_run {
        let pending = migrator
            .pending()
            .map_err(|e| format!("Failed to read migration ledger: {e}"))?;
        for migration in pending {
            print_migration_ddl(migration)?;
        }
        return Ok(());
    }

    let pending: Vec<(i64, String)> = migrator
        .pending()
        .map_err(|e| format!("Failed to read migration ledger: {e}"))?
        .into_iter()
        .map(|m| (m.version(), m.name().to_string()))
        .collect();
    let applied = migrator.run().map_err(|e| format!("Migration failed: {e}"))?;

    if args.quiet {
        return Ok(());
    }
    if applied.is_empty() {
        println!("No pending migrations.");
    }
    for (version, name) in pending.iter().filter(|(v, _)| applied.contains(v)) {
        println!("Applied migration {version}: {name}");
    }
    Ok(())
}

fn print_migration_ddl(migration: &MigrationDefinition) -> Result<(), String> {
    let statements = migration
        .statements()
        .map_err(|e| format!("Migration {}: {e}", migration.version()))?;
    println!("-- {}: {}", migration.version(), migration.name());
    for sql in statements {
        println!("{sql};");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// status command
// ---------------------------------------------------------------------------

fn run_status(args: StatusArgs, verbose: bool) -> Result<(), String> {
    let migrations = load_plan(&args.plan)?;
    let store = open_store(&args.database, verbose)?;
    let mut migrator = Migrator::new(&store, migrations).map_err(|e| format!("Failed to initialize migrator: {e}"))?;
    let status = migrator
        .status()
        .map_err(|e| format!("Failed to get migration status: {e}"))?;

    if args.json {
        let json = serde_json::to_string_pretty(&status).map_err(|e| format!("Failed to encode status: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    println!("Migration Status:");
    println!("  Applied: {}", format_versions(&status.applied));
    println!("  Pending: {}", format_versions(&status.pending));
    Ok(())
}

// ---------------------------------------------------------------------------
// columns command
// ---------------------------------------------------------------------------

fn run_columns(args: ColumnsArgs, verbose: bool) -> Result<(), String> {
    validate_identifier(&args.table).map_err(|e| e.to_string())?;
    let store = open_store(&args.database, verbose)?;

    let rows = store
        .storage()
        .execute(&format!("PRAGMA table_info({})", args.table))
        .map_err(|e| format!("Failed to introspect '{}': {e}", args.table))?;
    if rows.is_empty() {
        return Err(format!("table {} does not exist", args.table));
    }
    for row in &rows {
        let column = ColumnDefinition::from_pragma(row).map_err(|e| format!("Column of '{}': {e}", args.table))?;
        println!("{}", column.to_sql_definition());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_store(args: &DatabaseArgs, verbose: bool) -> Result<Store<SqliteStorage>, String> {
    let mut config = match (&args.db, &args.config) {
        (Some(db), _) => StoreConfig {
            file: DatabaseLocation::parse(db),
            ..StoreConfig::default()
        },
        (None, Some(path)) => StoreConfig::from_yaml_file(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        (None, None) => StoreConfig::default(),
    };
    config.debug = config.debug && verbose;

    connect(&config).map_err(|e| format!("Failed to open database '{}': {e}", config.file))
}

fn load_plan(path: &Path) -> Result<Vec<MigrationDefinition>, String> {
    MigrationPlan::load(path)
        .and_then(MigrationPlan::into_definitions)
        .map_err(|e| format!("Failed to load plan '{}': {e}", path.display()))
}

fn format_versions(versions: &[i64]) -> String {
    if versions.is_empty() {
        return "none".to_string();
    }
    versions.iter().map(i64::to_string).collect::<Vec<_>>().join(", ")
}
