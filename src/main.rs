//! shardwire - inspect Redis/Valkey nodes and cluster slot ownership

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use shardwire::client::RedisConn;
use shardwire::cluster::{resolve_node_slot_map, resolve_ownership, SlotOwner};
use shardwire::config::{CliArgs, Command};
use shardwire::utils::{ConnectionError, RespValue};

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Render a reply the way redis-cli does
fn format_reply(value: &RespValue, indent: usize, out: &mut String) {
    match value {
        RespValue::Null => out.push_str("(nil)\n"),
        RespValue::Error(e) => out.push_str(&format!("(error) {}\n", e)),
        RespValue::Integer(i) => out.push_str(&format!("(integer) {}\n", i)),
        RespValue::SimpleString(s) => out.push_str(&format!("{}\n", s)),
        RespValue::BulkString(b) => {
            out.push_str(&format!("\"{}\"\n", String::from_utf8_lossy(b).escape_debug()))
        }
        RespValue::Array(items) if items.is_empty() => out.push_str("(empty array)\n"),
        RespValue::Array(items) => {
            let width = items.len().to_string().len();
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(&" ".repeat(indent));
                }
                let prefix = format!("{:>width$}) ", i + 1, width = width);
                out.push_str(&prefix);
                format_reply(item, indent + prefix.len(), out);
            }
        }
    }
}

fn print_owners(owners: &[SlotOwner], as_json: bool) -> Result<()> {
    if as_json {
        let shards: Vec<_> = owners
            .iter()
            .map(|o| {
                json!({
                    "slot_left_boundary": o.slot_left_boundary,
                    "slot_right_boundary": o.slot_right_boundary,
                    "master": o.master,
                    "replicas": o.replicas,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&shards)?);
        return Ok(());
    }

    for o in owners {
        println!(
            "{:>5}-{:<5} master={} replicas=[{}]",
            o.slot_left_boundary,
            o.slot_right_boundary,
            o.master,
            o.replicas.join(", ")
        );
    }
    Ok(())
}

fn run_command(conn: &RedisConn, command: &Command) -> Result<()> {
    match command {
        Command::Ping => {
            info!("Connected to {}", conn.addresses().join(","));
            println!("PONG");
        }
        Command::Slots { json } => {
            let owners = resolve_ownership(conn).context("Failed to resolve slot ownership")?;
            print_owners(&owners, *json)?;
        }
        Command::Nodes => {
            let map = resolve_node_slot_map(conn).context("Failed to resolve node slot map")?;
            for (addr, slots) in &map.nodes {
                let ranges: Vec<String> = slots
                    .ranges
                    .iter()
                    .map(|r| format!("{}-{}", r.left, r.right))
                    .collect();
                println!("{} ({} slots): {}", addr, slots.slot_count(), ranges.join(" "));
            }
            if map.all.covers_all_slots() {
                info!("All slots covered");
            } else {
                warn!(
                    "Slot coverage incomplete: {} of {} slots assigned",
                    map.all.slot_count(),
                    shardwire::cluster::SLOT_COUNT
                );
            }
        }
        Command::Exec { args } => {
            let (cmd, rest) = args.split_first().context("No command given")?;
            let reply = conn.do_cmd(cmd, rest)?;
            let mut out = String::new();
            format_reply(&reply, 0, &mut out);
            print!("{}", out);
        }
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = CliArgs::parse_args();

    setup_logging(args.verbose, args.quiet);

    let config = args.to_config()?;

    let conn = RedisConn::connect(config)?;
    let result = run_command(&conn, &args.command);
    close_after(result, || conn.close())
}

/// Close once the command is done; a close failure is logged, never
/// allowed to mask the command's own outcome
fn close_after<F>(result: Result<()>, close: F) -> Result<()>
where
    F: FnOnce() -> std::result::Result<(), ConnectionError>,
{
    if let Err(e) = close() {
        warn!("Failed to close connection: {}", e);
    }
    result
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(value: &RespValue) -> String {
        let mut out = String::new();
        format_reply(value, 0, &mut out);
        out
    }

    #[test]
    fn test_format_scalars() {
        assert_eq!(render(&RespValue::Null), "(nil)\n");
        assert_eq!(render(&RespValue::Integer(3)), "(integer) 3\n");
        assert_eq!(render(&RespValue::SimpleString("OK".into())), "OK\n");
        assert_eq!(render(&RespValue::BulkString(b"v".to_vec())), "\"v\"\n");
        assert_eq!(render(&RespValue::Error("ERR x".into())), "(error) ERR x\n");
    }

    #[test]
    fn test_format_nested_array() {
        let value = RespValue::Array(vec![
            RespValue::Integer(0),
            RespValue::Array(vec![
                RespValue::BulkString(b"10.0.0.1".to_vec()),
                RespValue::Integer(6379),
            ]),
        ]);
        assert_eq!(
            render(&value),
            "1) (integer) 0\n2) 1) \"10.0.0.1\"\n   2) (integer) 6379\n"
        );
    }

    #[test]
    fn test_close_failure_keeps_command_error() {
        let closed = std::cell::Cell::new(false);
        let result = close_after(Err(anyhow::anyhow!("command failed")), || {
            closed.set(true);
            Err(ConnectionError::Closed)
        });
        assert!(closed.get());
        assert_eq!(result.unwrap_err().to_string(), "command failed");

        let result = close_after(Ok(()), || Err(ConnectionError::Closed));
        assert!(result.is_ok());
    }
}
