//! framarama CLI - finishing engine for photo frames
//!
//! Works on a finishing tree stored as a JSON file of records with their
//! nested-set positions. Documents exported from one tree can be imported
//! into another, and a tree can be rendered over any image.

use anyhow::{bail, Context as _, Result};
use framarama::prelude::*;
use framarama::tree::NestedSet;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let result = match args[1].as_str() {
        "list" => {
            list_plugins();
            Ok(())
        }
        "info" => match args.get(2) {
            Some(name) => plugin_info(name),
            None => Err(anyhow::anyhow!("Please specify a plugin name")),
        },
        "render" => render(&args[2..]),
        "export" => export(&args[2..]),
        "import" => import(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("framarama v{}", framarama::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                              List all available plugins");
    println!("  info <plugin>                     Show the fields of a plugin");
    println!("  render <tree> <input> <output>    Render a finishing tree over an image");
    println!("  export <tree> [--enabled]         Print a tree as an export document");
    println!("  import <document> <tree>          Reconcile a tree with an export document");
    println!("  help                              Show this help message");
    println!();
    println!("Render options:");
    println!("  --settings <file>     TOML settings ([render], [variables])");
    println!("  --display <WxH>       Display size exposed to templates (default: 800x480)");
    println!("  --watermark <style>   ribbon, hbars, vbars or none");
    println!("  --preview <file>      Also write the preview image");
    println!();
    println!("Set RUST_LOG=debug to trace every step.");
}

fn list_plugins() {
    let finishings = FinishingRegistry::with_builtins();
    let contexts = ContextRegistry::with_builtins();

    println!("Finishing plugins ({} total):", finishings.len());
    for plugin in finishings.iter() {
        println!("  • {:<10} {}", plugin.name(), plugin.description());
    }
    println!();
    println!("Context plugins ({} total):", contexts.len());
    for plugin in contexts.iter() {
        println!("  • {:<10} {}", plugin.name(), plugin.description());
    }
}

fn plugin_info(name: &str) -> Result<()> {
    let finishings = FinishingRegistry::with_builtins();
    let contexts = ContextRegistry::with_builtins();
    let metadata = match (finishings.get(name), contexts.get(name)) {
        (Some(plugin), _) => plugin.metadata(),
        (None, Some(plugin)) => plugin.metadata(),
        (None, None) => bail!("Unknown plugin '{}'", name),
    };

    println!("Plugin: {} ({})", metadata.title, metadata.name);
    println!();
    println!("  {}", metadata.description);
    println!();
    if !metadata.fields.is_empty() {
        println!("Fields:");
        for field in &metadata.fields {
            let required = if field.required { " (required)" } else { "" };
            println!("  • {} [{:?}]{}", field.name, field.kind, required);
            if !field.choices.is_empty() {
                println!("    one of: {}", field.choices.join(", "));
            }
            if !field.default.is_null() {
                println!("    default: {}", field.default.to_json());
            }
            if !field.help.is_empty() {
                println!("    {}", field.help);
            }
        }
    }
    Ok(())
}

fn render(args: &[String]) -> Result<()> {
    if args.len() < 3 {
        bail!("Usage: render <tree> <input> <output> [options]");
    }
    let (tree_path, input, output) = (&args[0], &args[1], &args[2]);

    let mut settings = Settings::default();
    let mut display = Display::new("cli", 800, 480);
    let mut preview_path = None;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--settings" if i + 1 < args.len() => {
                settings = Settings::load(&args[i + 1])
                    .with_context(|| format!("Failed to load settings from {}", args[i + 1]))?;
                i += 2;
            }
            "--display" if i + 1 < args.len() => {
                let (w, h) = parse_dimensions(&args[i + 1])
                    .with_context(|| format!("Invalid display size '{}'", args[i + 1]))?;
                display.device_width = w;
                display.device_height = h;
                i += 2;
            }
            "--watermark" if i + 1 < args.len() => {
                settings.render.watermark = args[i + 1].parse().map_err(anyhow::Error::msg)?;
                i += 2;
            }
            "--preview" if i + 1 < args.len() => {
                preview_path = Some(args[i + 1].clone());
                i += 2;
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                i += 1;
            }
        }
    }

    let tree = load_tree(Path::new(tree_path))?;
    let contexts: Vec<FrameContext> = settings.globals_context().into_iter().collect();
    let frame = Frame::new(tree_path.as_str());
    let item = Item::new(input.as_str());

    let finishing_registry = FinishingRegistry::with_builtins();
    let context_registry = ContextRegistry::with_builtins();
    let adapter = ImageCrateAdapter::new();
    let mut options = settings.render.clone();
    if options.format.is_none() {
        options.format = Path::new(output)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned());
    }
    let processor = FinishingProcessor::new(&adapter, &finishing_registry, &context_registry).with_options(options);
    let request = RenderRequest::new(&display, &frame, &item)
        .with_finishings(&tree)
        .with_contexts(&contexts);

    let Some(result) = processor.process(&request)? else {
        bail!("Nothing rendered for '{}'", input);
    };
    std::fs::write(output, &result.data).with_context(|| format!("Failed to write {}", output))?;
    if let Some(path) = preview_path {
        std::fs::write(&path, &result.preview).with_context(|| format!("Failed to write {}", path))?;
    }
    println!(
        "Rendered {} -> {} ({}x{}, {})",
        input, output, result.width, result.height, result.mime
    );
    Ok(())
}

fn export(args: &[String]) -> Result<()> {
    let Some(tree_path) = args.first() else {
        bail!("Usage: export <tree> [--enabled]");
    };
    let mode = if args.iter().any(|a| a == "--enabled") {
        ExportMode::Enabled
    } else {
        ExportMode::All
    };
    let tree = load_tree(Path::new(tree_path))?;
    let registry = FinishingRegistry::with_builtins();
    let document = registry.export_config(tree_path, &tree, mode)?;
    println!("{}", document.to_json()?);
    Ok(())
}

fn import(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        bail!("Usage: import <document> <tree>");
    }
    let (document_path, tree_path) = (Path::new(&args[0]), Path::new(&args[1]));
    let text = std::fs::read_to_string(document_path)
        .with_context(|| format!("Failed to read {}", document_path.display()))?;
    let document = ExportDocument::from_json(&text).context("Invalid export document")?;

    let mut tree = if tree_path.exists() {
        load_tree(tree_path)?
    } else {
        FinishingTree::default()
    };
    let registry = FinishingRegistry::with_builtins();
    let report = registry.import_config(&document, &mut tree, BaseValues::default())?;
    save_tree(tree_path, &tree)?;
    println!(
        "Imported '{}': {} created, {} updated, {} deleted",
        document.title, report.created, report.updated, report.deleted
    );
    Ok(())
}

fn load_tree(path: &Path) -> Result<FinishingTree> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<(Finishing, NestedSet)> =
        serde_json::from_str(&text).with_context(|| format!("Invalid tree file {}", path.display()))?;
    Ok(FinishingTree::from_nested_set(records)?)
}

fn save_tree(path: &Path, tree: &FinishingTree) -> Result<()> {
    let json = serde_json::to_string_pretty(&tree.nested_set_records())?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn parse_dimensions(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}
