use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context as _;
use directories::ProjectDirs;
use pdfshelf_application::Library;
use pdfshelf_core::NavigationParams;
use pdfshelf_engine::PdfEngine;
use pdfshelf_storage::{BINARY_DB_FILE, BinaryDb, METADATA_DB_FILE, MetadataDb};
use pdfshelf_ui::Ui;

const USAGE: &str = "usage: pdfshelf [--import <file.pdf>]... [<query>]\n\n\
    <query>  reader parameters such as `id=book_...` or `file=/path/to.pdf&name=Title`";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    imports: Vec<PathBuf>,
    query: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-i" | "--import" => {
                let path = args.next().context("--import needs a file path")?;
                parsed.imports.push(PathBuf::from(path));
            }
            flag if flag.starts_with('-') => anyhow::bail!("unknown option {flag}\n{USAGE}"),
            _ => {
                if parsed.query.replace(arg).is_some() {
                    anyhow::bail!("only one reader query is accepted\n{USAGE}");
                }
            }
        }
    }
    Ok(Some(parsed))
}

fn main() {
    if let Err(err) = run() {
        log::error!("{err:#}");
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn data_dir() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("PDFSHELF_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let project_dirs =
        ProjectDirs::from("dev", "pdfshelf", "pdfshelf").context("resolve project dirs")?;
    Ok(project_dirs.data_dir().to_path_buf())
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging(data_dir: &std::path::Path) -> anyhow::Result<()> {
    let log_path = data_dir.join("pdfshelf.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("PDFSHELF_LOG", "info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("init logger")?;
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let Some(args) = parse_args(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };

    let data_dir = data_dir()?;
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;
    init_logging(&data_dir)?;
    log::info!("pdfshelf starting, data in {}", data_dir.display());

    let metadata = MetadataDb::open(data_dir.join(METADATA_DB_FILE))?;
    let binaries = BinaryDb::open(data_dir.join(BINARY_DB_FILE))?;
    let settings = metadata.load_settings()?;

    let engine = PdfEngine::new();
    if let Err(err) = engine.check_pdfium() {
        log::warn!("pdfium unavailable, pages will fail to render: {err:#}");
    }

    let library = Library::new(Rc::new(metadata), Rc::new(binaries));
    let mut ui = Ui::new(library, settings, engine);
    if !args.imports.is_empty() {
        let imported = ui.import_paths(&args.imports);
        log::info!("imported {imported} of {} file(s)", args.imports.len());
    }
    let open = args.query.as_deref().map(NavigationParams::from_query);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("build runtime")?;
    let local = tokio::task::LocalSet::new();
    runtime.block_on(local.run_until(ui.run(open)))
}
