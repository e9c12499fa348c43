// src/main.rs

//! Thin CLI front-end over the SynthDB core. This binary exists only as
//! a structural mirror of the library, exposing a handful of operations
//! for manual poking at a database file.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use synthdb::{Connection, DataType};
use tracing::info;

#[derive(Parser)]
#[command(name = "synthdb")]
#[command(author, version, about = "Versioned, type-partitioned EAV store over SQLite", long_about = None)]
struct Cli {
    /// Path to the database file.
    #[arg(short, long, default_value = "db.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database file and install the fixed schema.
    Init,
    /// Create a new logical table.
    CreateTable { name: String },
    /// Add a column of an explicit type to a table.
    AddColumn {
        table: String,
        column: String,
        #[arg(value_enum)]
        data_type: CliDataType,
    },
    /// List live tables.
    ListTables,
    /// List live columns of a table.
    ListColumns {
        table: String,
        #[arg(long)]
        include_deleted: bool,
    },
    /// Query a table's view.
    Query { table: String },
}

#[derive(Clone, clap::ValueEnum)]
enum CliDataType {
    Text,
    Integer,
    Real,
    Timestamp,
}

impl From<CliDataType> for DataType {
    fn from(value: CliDataType) -> Self {
        match value {
            CliDataType::Text => DataType::Text,
            CliDataType::Integer => DataType::Integer,
            CliDataType::Real => DataType::Real,
            CliDataType::Timestamp => DataType::Timestamp,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut conn = Connection::open(&cli.database)?;

    match cli.command {
        Commands::Init => {
            conn.init_db()?;
            info!(path = %cli.database.display(), "initialized database");
        }
        Commands::CreateTable { name } => {
            let table_id = conn.create_table(&name)?;
            println!("created table '{name}' (id {table_id})");
        }
        Commands::AddColumn { table, column, data_type } => {
            let column_id = conn.add_column(&table, &column, data_type.into())?;
            println!("added column '{column}' to '{table}' (id {column_id})");
        }
        Commands::ListTables => {
            for table in conn.list_tables()? {
                println!("{}", table.name);
            }
        }
        Commands::ListColumns { table, include_deleted } => {
            for column in conn.list_columns(&table, include_deleted)? {
                println!("{}\t{}", column.name, column.data_type.as_str());
            }
        }
        Commands::Query { table } => {
            for row in conn.query(&table, None)? {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
    }

    Ok(())
}
