mod app;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use vitrine_core::{
    ApiVersion, Catalog, Config, Gallery, HeadlessBackend, HookRegistry, ParamSpec, Precision,
};

#[derive(Debug, Parser)]
#[command(
    name = "vitrine-cli",
    version = env!("CARGO_PKG_VERSION"),
    about = "vitrine - a data-driven gallery of Shadertoy-style fragment shaders",
    long_about = "vitrine wraps standalone GLSL fragment-shader snippets in catalog entries (source, display name, sort order, textures, buffer passes, tweakable parameters) and renders the selected entry full screen with WebGPU."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open the gallery window
    Run {
        /// Path to the TOML configuration file
        #[arg(value_name = "FILE")]
        config_file: String,
        /// Entry to show first (overrides catalog.start)
        #[arg(long)]
        start: Option<String>,
    },
    /// Print the catalog in display order
    List {
        #[arg(value_name = "FILE")]
        config_file: String,
        /// Only entries carrying this tag (repeatable)
        #[arg(long)]
        tag: Vec<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Compile and activate every entry without opening a window
    Check {
        #[arg(value_name = "FILE")]
        config_file: String,
    },
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = match args.command {
        Command::Run { config_file, start } => run_gallery(&config_file, start),
        Command::List {
            config_file,
            tag,
            json,
        } => run_list(&config_file, &tag, json),
        Command::Check { config_file } => run_check(&config_file),
    };

    if let Err(exit_code) = result {
        process::exit(exit_code);
    }
}

fn load_config(config_path: &str) -> Result<(Config, PathBuf), i32> {
    let config_file_path = Path::new(config_path);
    if !config_file_path.exists() {
        eprintln!(
            "Error: Configuration file '{}' does not exist.",
            config_path
        );
        eprintln!("Please provide a valid TOML configuration file.");
        eprintln!("Example: vitrine-cli run gallery/gallery.toml");
        return Err(1);
    }
    if !config_file_path.is_file() {
        eprintln!("Error: '{}' is not a file.", config_path);
        eprintln!("Please provide a valid TOML configuration file.");
        return Err(1);
    }

    let conf_str = match std::fs::read_to_string(config_file_path) {
        Ok(content) => content,
        Err(err) => {
            eprintln!(
                "Error: Failed to read configuration file '{}'.",
                config_path
            );
            eprintln!("Reason: {}", err);
            return Err(2);
        }
    };

    let conf = match Config::from_toml(&conf_str) {
        Ok(config) => config,
        Err(err) => {
            eprintln!(
                "Error: Failed to parse TOML configuration file '{}'.",
                config_path
            );
            eprintln!("TOML parsing error: {}", err);
            eprintln!();
            eprintln!("Please check your TOML syntax. Common issues:");
            eprintln!("  - Missing closing brackets ]");
            eprintln!("  - Invalid comment syntax (use # not //)");
            eprintln!("  - Missing [window] or [catalog] sections");
            return Err(3);
        }
    };

    if let Err(err) = conf.validate() {
        eprintln!("Error: Configuration validation failed.");
        eprintln!("{}", err);
        return Err(4);
    }

    let conf_dir = config_file_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((conf, conf_dir))
}

fn load_catalog(config: &Config, conf_dir: &Path) -> Result<Catalog, i32> {
    let mut catalog = match Catalog::load(&config.catalog_paths(conf_dir)) {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("Error: Failed to load the shader catalog.");
            eprintln!("{}", err);
            return Err(5);
        }
    };

    catalog.retain_tags(&config.tag_filter());
    if catalog.is_empty() {
        eprintln!(
            "Error: No catalog entries match the configured tags: {}",
            config.catalog.tags.join(", ")
        );
        return Err(5);
    }
    Ok(catalog)
}

fn run_gallery(config_path: &str, start: Option<String>) -> Result<(), i32> {
    let (config, conf_dir) = load_config(config_path)?;
    let catalog = load_catalog(&config, &conf_dir)?;

    let start = start.or_else(|| config.catalog.start.clone());
    if let Some(key) = &start {
        if catalog.get(key).is_none() {
            eprintln!("Error: Start entry '{}' is not in the catalog.", key);
            return Err(5);
        }
    }

    match app::run(config, catalog, start) {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!("This might be due to:");
            eprintln!("  - Graphics driver issues");
            eprintln!("  - No compatible GPU adapter");
            eprintln!("  - An unknown hook set in the catalog");
            Err(6)
        }
    }
}

#[derive(Serialize)]
struct ListEntry<'a> {
    key: &'a str,
    name: &'a str,
    sort: i64,
    tags: &'a [String],
    api: ApiVersion,
    precision: Precision,
    buffers: Vec<&'a str>,
    params: &'a [ParamSpec],
    hooks: Option<&'a str>,
    origin: Option<&'a str>,
}

fn run_list(config_path: &str, tags: &[String], json: bool) -> Result<(), i32> {
    let (config, conf_dir) = load_config(config_path)?;
    let catalog = load_catalog(&config, &conf_dir)?;

    let tags: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    let entries: Vec<ListEntry> = catalog
        .iter()
        .filter(|d| tags.is_empty() || tags.iter().any(|t| d.has_tag(t)))
        .map(|d| ListEntry {
            key: &d.key,
            name: &d.name,
            sort: d.sort,
            tags: &d.tags,
            api: d.api,
            precision: d.precision,
            buffers: d.buffers.iter().map(|b| b.name.as_str()).collect(),
            params: &d.params,
            hooks: d.hooks.as_deref(),
            origin: catalog.origin(&d.key),
        })
        .collect();

    if json {
        match serde_json::to_string_pretty(&entries) {
            Ok(text) => println!("{}", text),
            Err(err) => {
                eprintln!("Error: Failed to serialize catalog: {}", err);
                return Err(6);
            }
        }
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{:>6}  {:<24} {:<32} [{}]",
            entry.sort,
            entry.key,
            entry.name,
            entry.tags.join(", ")
        );
    }
    Ok(())
}

fn run_check(config_path: &str) -> Result<(), i32> {
    let (config, conf_dir) = load_config(config_path)?;
    let catalog = load_catalog(&config, &conf_dir)?;
    let total = catalog.len();

    let backend = HeadlessBackend::new(config.window.width, config.window.height);
    let mut gallery = match Gallery::new(
        catalog,
        HookRegistry::with_builtins(),
        backend,
        config.plan_options(),
    ) {
        Ok(gallery) => gallery,
        Err(err) => {
            eprintln!("Error: {}", err);
            return Err(5);
        }
    };

    let mut failures = 0;
    for index in 0..total {
        let result = gallery.select_index(index).and_then(|_| gallery.frame());
        let key = gallery.catalog().get_index(index).map(|d| d.key.clone()).unwrap_or_default();
        match result {
            Ok(_) => println!("ok    {}", key),
            Err(err) => {
                failures += 1;
                println!("FAIL  {}", key);
                eprintln!("{}", err);
            }
        }
    }
    gallery.deactivate();

    println!("{} of {} entries passed", total - failures, total);
    if failures > 0 {
        return Err(7);
    }
    Ok(())
}
