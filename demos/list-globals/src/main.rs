//! Lists the compositor's globals, and optionally dumps one of them.
//!
//! ```text
//! list-globals                 # name, interface, version of every global
//! list-globals wl_output       # bind wl_output and print its state
//! list-globals --json          # globals as JSON
//! ```
//!
//! Log verbosity follows `RUST_LOG` (e.g. `RUST_LOG=waylink=debug`).

use tracing_subscriber::EnvFilter;
use waylink::prelude::*;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    json: bool,
    schema: Option<String>,
    interface: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--schema" => {
                let path = args.next().ok_or("--schema needs a file")?;
                options.schema = Some(path);
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}")),
            _ if options.interface.is_some() => {
                return Err(format!("unexpected argument {arg}"));
            }
            _ => options.interface = Some(arg),
        }
    }
    Ok(options)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args(std::env::args().skip(1))?;
    let display = Display::connect().await?;
    if let Some(path) = &options.schema {
        display.load_file(path)?;
    }

    let mut notices = display.notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice {
                Notice::Warning(w) => tracing::warn!(warning = %w, "compositor"),
                Notice::Error(e) => tracing::error!(error = %e, "compositor"),
            }
        }
    });

    let Some(interface) = options.interface else {
        let globals = display.globals();
        if options.json {
            println!("{}", serde_json::to_string_pretty(&globals)?);
        } else {
            for g in &globals {
                println!("{:>4}  {:<40} v{}", g.name, g.interface, g.version);
            }
        }
        return Ok(());
    };

    let proxy = display.bind(&interface, None).await?;
    let snapshot = proxy.drain().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    display.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_defaults() {
        assert_eq!(parse_args(args(&[])).unwrap(), Options::default());
    }

    #[test]
    fn test_parse_args_interface_and_flags() {
        let options = parse_args(args(&["--json", "wl_output", "--schema", "xdg.json"])).unwrap();
        assert_eq!(
            options,
            Options {
                json: true,
                schema: Some("xdg.json".into()),
                interface: Some("wl_output".into()),
            }
        );
    }

    #[test]
    fn test_parse_args_rejects_unknown_flag() {
        let err = parse_args(args(&["--verbose"])).unwrap_err();
        assert_eq!(err, "unknown flag --verbose");
    }

    #[test]
    fn test_parse_args_schema_without_path_fails() {
        assert!(parse_args(args(&["--schema"])).is_err());
    }
}
