use clap::Parser;
use serde_json::json;

use std::sync::Arc;

use rest_query_filters::{Params, Query};

/// Render SQL fragments from query-string style key=value pairs.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Parameter pairs, e.g. 'id[gte]=1' 'sort=-id'
    params: Vec<String>,
    /// Table name for the full statement
    #[arg(long, default_value = "t")]
    table: String,
    /// Typed declarations, e.g. 'id:int' (repeatable)
    #[arg(long = "declare")]
    declarations: Vec<String>,
    /// Skip unknown filter names instead of failing
    #[arg(long)]
    ignore_unknown: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut params = Params::new();
    for pair in &args.params {
        let Some((key, value)) = pair.split_once('=') else {
            eprintln!("expected key=value, got: {pair}");
            std::process::exit(1);
        };
        params
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }

    let mut q = Query::new().with_params(params);
    q.ignore_unknown_filters(args.ignore_unknown);
    // fields/sort demand an explicit validator; the tool has no schema to
    // check against, so accept anything.
    q.add_validation("fields", Some(Arc::new(|_: &_| Ok(()))));
    q.add_validation("sort", Some(Arc::new(|_: &_| Ok(()))));
    for decl in &args.declarations {
        q.add_validation(decl, None);
    }
    // Undeclared plain keys are accepted as string filters so the tool is
    // usable without a schema.
    for pair in &args.params {
        if let Some((key, _)) = pair.split_once('=') {
            let base = key.split('[').next().unwrap_or(key);
            q.allow_special_filters([base]);
        }
    }

    if let Err(err) = q.parse() {
        eprintln!("parse failed: {err}");
        std::process::exit(1);
    }

    let out = json!({
        "sql": q.sql(&args.table),
        "where": q.where_clause(),
        "args": q.args(),
    });
    match serde_json::to_string_pretty(&out) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("encode failed: {err}"),
    }
}
