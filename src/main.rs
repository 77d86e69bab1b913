use anyhow::{Context, Result};
use atomic_weaver::cli::{Cli, Commands, OutputFormat};
use atomic_weaver::config::resolve_schema_root;
use atomic_weaver::schema::SchemaTables;
use atomic_weaver::weave::{WeaveReport, decode_artifact, weave_paths};
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.clone() {
        Commands::Weave { paths, format } => {
            let schema = load_schema(&cli)?;
            let report = weave_paths(&paths, &schema)?;
            print_report(&report, format)?;
            if report.failed_units > 0 {
                anyhow::bail!(
                    "{} of {} artifacts failed to weave",
                    report.failed_units,
                    report.scanned
                );
            }
        }
        Commands::Inspect { path } => {
            let unit = decode_artifact(&path)?;
            println!("{}", serde_json::to_string_pretty(&unit)?);
        }
        Commands::Schema => {
            let schema = load_schema(&cli)?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn load_schema(cli: &Cli) -> Result<SchemaTables> {
    let schema_root = resolve_schema_root(cli)?;
    SchemaTables::load(&schema_root)
        .context("prerequisite schema artifacts missing; no input file was touched")
}

fn print_report(report: &WeaveReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print!("{}", render_text(report)),
    }
    Ok(())
}

fn render_text(report: &WeaveReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("scanned: {}\n", report.scanned));
    out.push_str(&format!("woven: {}\n", report.woven_units));
    out.push_str(&format!("unchanged: {}\n", report.unchanged_units));
    out.push_str(&format!("failed: {}\n", report.failed_units));
    out.push_str(&format!("duration_ms: {}\n", report.duration_ms));
    for unit in &report.units {
        out.push_str(&format!(
            "- {:?} {} (methods: {})\n",
            unit.status,
            unit.path,
            unit.woven_methods.join(", ")
        ));
        if let Some(err) = &unit.error {
            out.push_str(&format!("  error: {err}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomic_weaver::weave::{UnitReport, UnitStatus};

    #[test]
    fn render_text_lists_units_and_errors() {
        let report = WeaveReport {
            scanned: 2,
            woven_units: 1,
            unchanged_units: 0,
            failed_units: 1,
            duration_ms: 7,
            units: vec![
                UnitReport {
                    path: "/tmp/Counter.class".to_string(),
                    status: UnitStatus::Woven,
                    woven_methods: vec!["add".to_string()],
                    outputs: vec![],
                    error: None,
                    duration_ms: 3,
                },
                UnitReport {
                    path: "/tmp/Broken.class".to_string(),
                    status: UnitStatus::Failed,
                    woven_methods: vec![],
                    outputs: vec![],
                    error: Some("failed to decode".to_string()),
                    duration_ms: 1,
                },
            ],
        };

        let text = render_text(&report);
        assert!(text.contains("woven: 1"));
        assert!(text.contains("/tmp/Counter.class (methods: add)"));
        assert!(text.contains("  error: failed to decode"));
    }
}
