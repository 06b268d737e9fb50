//! mbe - evaluate build property expressions and inspect import graphs

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[cfg(feature = "cli")]
use msbuild_eval::{
    format_diagnostics, BuildDocument, EngineConfig, EvaluationContextExt, FilenameShortener,
    ImportTree, ParseEnvironment, PropertyTable,
};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "mbe")]
#[command(version)]
#[command(about = "Evaluate build property expressions and inspect import graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression such as `$(OutputPath)\app.dll`
    Eval {
        /// Expression to evaluate
        expr: String,

        /// Define a property as NAME=VALUE; repeat a name to make it multi-valued
        #[arg(short = 'p', long = "property", value_name = "NAME=VALUE")]
        properties: Vec<String>,

        /// Print every permutation instead of the scalar value
        #[arg(long)]
        permute: bool,
    },

    /// Parse a document and show its import tree
    Imports {
        /// Build file to parse
        file: String,

        /// Engine configuration (JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Print the tree and diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Eval {
            expr,
            properties,
            permute,
        } => run_eval(&expr, &properties, permute),
        Commands::Imports { file, config, json } => run_imports(&file, config.as_deref(), json),
    };

    match result {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "cli")]
fn parse_properties(definitions: &[String]) -> Result<PropertyTable, String> {
    let mut table = PropertyTable::new();
    for definition in definitions {
        let (name, value) = definition
            .split_once('=')
            .ok_or_else(|| format!("invalid property '{}', expected NAME=VALUE", definition))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("invalid property '{}', empty name", definition));
        }
        table.append(name, value);
    }
    Ok(table)
}

#[cfg(feature = "cli")]
fn run_eval(expr: &str, definitions: &[String], permute: bool) -> Result<ExitCode, String> {
    let props = parse_properties(definitions)?;
    if permute {
        let permutations = props.evaluate_permutations(expr).map_err(|e| e.to_string())?;
        for value in permutations.iter() {
            println!("{}", value);
        }
    } else {
        let value = props.evaluate(expr).map_err(|e| e.to_string())?;
        println!("{}", value);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "cli")]
fn run_imports(file: &str, config: Option<&str>, json: bool) -> Result<ExitCode, String> {
    let config = match config {
        Some(path) => EngineConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => EngineConfig::default(),
    };
    let env = ParseEnvironment::from_config(config);
    let document = BuildDocument::load(file, None, &env).map_err(|e| e.to_string())?;
    let tree = ImportTree::build(&document, &FilenameShortener::new(env.runtime()));
    let diagnostics: Vec<_> = document.all_diagnostics().into_iter().cloned().collect();

    if json {
        let output = serde_json::json!({
            "file": document.filename(),
            "tools_version": document.tools_version(),
            "imports_hash": format!("{:016x}", document.imports_hash()),
            "tree": tree,
            "diagnostics": diagnostics,
        });
        let text = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
        println!("{}", text);
    } else {
        println!("{} (ToolsVersion {})", document.filename(), document.tools_version());
        print!("{}", tree.render());
        if !diagnostics.is_empty() {
            let source = std::fs::read_to_string(document.filename()).ok();
            eprint!("{}", format_diagnostics(&diagnostics, source.as_deref()));
        }
    }

    if document.has_errors() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(not(feature = "cli"))]
fn main() -> ExitCode {
    eprintln!("CLI feature not enabled. Build with --features cli");
    ExitCode::FAILURE
}
