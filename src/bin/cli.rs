//! MiniSQL - CLI Client

use std::env;

use anyhow::{bail, Context, Result};
use minisql::client::{Client, Response};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::net::TcpStream;

/// Connection settings
struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        host: "127.0.0.1".to_string(),
        port: minisql::config::DEFAULT_PORT,
        user: "root".to_string(),
        password: String::new(),
    };
    let mut iter = env::args().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .with_context(|| format!("missing value for {}", name))
        };
        match arg.as_str() {
            "--host" | "-h" => args.host = value("--host")?,
            "--port" | "-P" => {
                let port = value("--port")?;
                args.port = port.parse().with_context(|| format!("invalid port: {}", port))?;
            }
            "--user" | "-u" => args.user = value("--user")?,
            "--password" | "-p" => args.password = value("--password")?,
            other => bail!("unknown argument: {}", other),
        }
    }

    Ok(args)
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help              Show this help message
  .quit              Exit
  .exit              Exit

SQL Commands:
  CREATE TABLE ...   Create a new table
  INSERT INTO ...    Insert one row
  SELECT * FROM ...  Read a table

Examples:
  CREATE TABLE users (id INT, name VARCHAR(100));
  INSERT INTO users VALUES (1, 'Alice');
  SELECT * FROM users;
"#
    );
}

/// Format query results as a table
fn format_results(columns: &[String], rows: &[Vec<Option<String>>]) -> String {
    let cell = |v: &Option<String>| v.clone().unwrap_or_else(|| "NULL".to_string());

    // Calculate column widths
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell(value).chars().count());
            }
        }
    }

    let mut output = String::new();

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    // Header
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    // Rows
    for row in rows {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:>width$} ", cell(v), width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", row_str));
    }

    if !rows.is_empty() {
        output.push_str(&separator);
    }

    output.push_str(&format!("{} row(s) returned\n", rows.len()));
    output
}

/// Execute a SQL statement
async fn execute_sql(client: &mut Client<TcpStream>, sql: &str) -> Result<()> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Ok(());
    }

    match client.query(sql).await {
        Ok(Response::Ok) => println!("OK"),
        Ok(Response::ResultSet { columns, rows }) => print!("{}", format_results(&columns, &rows)),
        Err(e @ minisql::Error::ServerError { .. }) => eprintln!("{}", e),
        Err(e) => return Err(e).context("connection lost"),
    }
    Ok(())
}

/// Main REPL loop
async fn run_repl(mut client: Client<TcpStream>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut input_buffer = String::new();

    loop {
        let prompt = if input_buffer.is_empty() {
            "minisql> "
        } else {
            "     ...> "
        };

        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                input_buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim();

        if input_buffer.is_empty() && trimmed.starts_with('.') {
            rl.add_history_entry(trimmed)?;
            match trimmed {
                ".quit" | ".exit" => break,
                ".help" => print_help(),
                other => {
                    eprintln!("Unknown command: {}", other);
                    eprintln!("Type '.help' for available commands.");
                }
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        input_buffer.push_str(&line);
        input_buffer.push('\n');

        // Statements end with a semicolon
        if trimmed.ends_with(';') {
            let sql = std::mem::take(&mut input_buffer);
            rl.add_history_entry(sql.trim())?;
            execute_sql(&mut client, &sql).await?;
        }
    }

    client.quit().await?;
    println!("Goodbye!");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let addr = format!("{}:{}", args.host, args.port);

    let client = Client::connect(&addr, &args.user, &args.password)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    println!(
        "Connected to {} (server {}, connection {})",
        addr,
        client.server_version(),
        client.connection_id()
    );
    println!("Type '.help' for help, '.quit' to exit");

    run_repl(client).await
}
