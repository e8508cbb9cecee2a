use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use log::{debug, error, LevelFilter};

use docx2tei::batch::{collect_inputs, convert_file, BatchOptions};
use docx2tei::config::{find_default_config, init_default_config, load_config, AppConfig};
use docx2tei::docx::read_document;
use docx2tei::progress::BatchProgress;
use docx2tei::styles::StyleTable;
use docx2tei::tei::pages::PageNumbering;
use docx2tei::tei::template::{list_placeholders, load_template};

#[derive(Parser, Debug)]
#[command(name = "docx2tei")]
#[command(about = "Convert styled Word editions into TEI XML with critical apparatus", long_about = None)]
struct Args {
    /// Input .docx files or directories of them
    #[arg(value_name = "DOCX")]
    inputs: Vec<PathBuf>,

    /// Directory of .docx files to convert
    #[arg(short, long, value_name = "DIR")]
    indir: Option<PathBuf>,

    /// Output directory (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Write each document's diagnostics to <DIR>/<stem>.log
    #[arg(short, long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// TEI template with {Label} placeholders (default: embedded template)
    #[arg(short, long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Location of the DTDs named in the doctype
    #[arg(long, value_name = "URL")]
    dtd_path: Option<String>,

    /// Witness of the lemma when the metadata table gives no edition sigla
    #[arg(long, value_name = "SIGLUM")]
    base_sigil: Option<String>,

    /// Config file path (default: search for docx2tei.toml upwards, or DOCX2TEI_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Write <prefix>-NNNN documents into NNNN/ subfolders
    #[arg(long)]
    text_folders: bool,

    /// Renumber page and line milestones sequentially
    #[arg(long)]
    number_milestones: bool,

    /// First page number for --number-milestones (a `text-pNN-` file stem overrides it)
    #[arg(long, value_name = "N", default_value_t = 1, requires = "number_milestones")]
    start: u64,

    /// Add a `<page>.1` line milestone after each page when numbering
    #[arg(long, requires = "number_milestones")]
    first_line: bool,

    /// List the template's placeholders, then exit
    #[arg(long)]
    metafields: bool,

    /// Write a default docx2tei.toml into the current directory, then exit
    #[arg(long)]
    init_config: bool,

    /// Overwrite an existing config when used with --init-config
    #[arg(long)]
    force: bool,

    /// Print the paragraphs read from each input as JSON, then exit
    #[arg(long)]
    dump_paragraphs: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", args.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
    debug!("{args:?}");

    if args.init_config {
        let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let mut inputs = args.inputs.clone();
    if let Some(dir) = args.indir.clone() {
        inputs.push(dir);
    }
    let workdir = inputs
        .first()
        .map(|p| if p.is_dir() { p.clone() } else { p.parent().map(PathBuf::from).unwrap_or_default() })
        .unwrap_or_else(|| PathBuf::from("."));

    let cfg_path = args.config.clone().or_else(|| find_default_config(&workdir));
    let cfg = match cfg_path.as_deref() {
        Some(p) => load_config(p)?,
        None => AppConfig::default(),
    };
    if let Some(p) = cfg_path.as_deref() {
        debug!("config: {}", p.display());
    }

    let template_path = args.template.clone().or_else(|| cfg.convert.template.clone());
    let template = load_template(template_path.as_deref())?;

    if args.metafields {
        for label in list_placeholders(&template) {
            println!("{label}");
        }
        return Ok(());
    }

    if inputs.is_empty() {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!(
            "\n\nUSAGE:\n  docx2tei <input.docx>... [-o <out-dir>]\n\nTIPS:\n  - Default config search: docx2tei.toml (upwards), or set DOCX2TEI_CONFIG.\n  - Run with --metafields to see the template's metadata labels.\n"
        );
        return Ok(());
    }
    let files = collect_inputs(&inputs)?;

    if args.dump_paragraphs {
        for file in &files {
            let doc = read_document(file)?;
            let json = serde_json::to_string_pretty(&doc.paragraphs)
                .context("serialize paragraphs")?;
            println!("{json}");
        }
        return Ok(());
    }

    let opts = BatchOptions {
        out_dir: args.out.clone().unwrap_or_else(|| PathBuf::from(".")),
        log_dir: args.log_dir.clone(),
        template,
        dtd_path: args
            .dtd_path
            .clone()
            .unwrap_or_else(|| cfg.dtd_path().to_string()),
        base_sigil: args
            .base_sigil
            .clone()
            .unwrap_or_else(|| cfg.base_sigil().to_string()),
        overwrite: args.overwrite || cfg.convert.overwrite.unwrap_or(false),
        text_folders: args.text_folders || cfg.convert.text_folders.unwrap_or(false),
        styles: StyleTable::with_overrides(cfg.styles.clone()),
        page_numbering: args.number_milestones.then_some(PageNumbering {
            start: args.start,
            first_line: args.first_line,
        }),
    };

    let mut progress = BatchProgress::new(true, files.len());
    for file in &files {
        let name = file.display().to_string();
        progress.document_started(&name);
        match convert_file(file, &opts) {
            Ok(outcome) => progress.document_finished(&name, outcome.diagnostics.len(), true),
            Err(err) => {
                error!("{name}: {err:#}");
                progress.document_finished(&name, 0, false);
            }
        }
    }
    progress.summary();

    if progress.failed() > 0 {
        anyhow::bail!("{} of {} documents failed", progress.failed(), files.len());
    }
    Ok(())
}
