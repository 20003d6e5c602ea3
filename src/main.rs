use rowtable::{Result, SortAlgorithm, Table, TableError, TableOptions, Value};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rowtable=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();
}

/// Options come from the JSON file named by the first argument, if any.
fn load_options() -> Result<TableOptions> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| TableError::Options(format!("{path}: {e}")))?;
            TableOptions::from_json(&json)
        }
        None => Ok(TableOptions::default()),
    }
}

fn main() -> Result<()> {
    init_logging();
    let options = load_options()?;
    tracing::info!(?options, "starting");

    let mut table = Table::with_options(options);
    table.column_add_parse("int32 id key, string(16) name, rstring notes")?;
    table.prepare()?;

    for (id, name, notes) in [
        (3, "carol", "prefers tea"),
        (1, "alice", "on call"),
        (2, "bob", "on call"),
    ] {
        table.row_add_values(&[Value::Int32(id), Value::from(name), Value::from(notes)])?;
    }

    table.sort(0, true, 0, table.row_count(), SortAlgorithm::Selection);
    for row in table.iter_rows() {
        let cells: Vec<String> = row.iter().map(Value::as_string).collect();
        println!("{}", cells.join(" | "));
    }

    if let Some(row) = table.find_sorted(0, true, 0, table.row_count(), &Value::Int32(2)) {
        println!("id 2 is at row {row}: {}", table.cell_get(row, 1));
    }
    println!(
        "{} rows, {} distinct notes, {} bytes allocated",
        table.row_count(),
        table.blob_count(),
        table.allocated_bytes()
    );
    Ok(())
}
