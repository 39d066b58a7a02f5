use cartograph_core::geom::pixel_size;
use cartograph_core::location::MapLocation;
use cartograph_core::retrieval::{self, MapDataQuery, PageId};
use cartograph_core::tag::is_valid_group_name;
use cartograph_core::tiles::TileGridConfig;
use cartograph_core::{
    DocumentContext, GeodataPipeline, GroupAggregator, HtmlInlineRenderer, InlineRenderer,
    MapCatalog, PersistedGroups, PipelineOptions, PlainTextRenderer, SiteConfig, TagArgs, TagKind,
    TileGridCompositor, TileUrlTemplate, persist,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    /// A flag value that fails validation.
    BadValue(String),
    Io(std::io::Error),
    Core(cartograph_core::Error),
    Json(serde_json::Error),
    /// The snippet was read but is not acceptable map data.
    Rejected(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::BadValue(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Core(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Rejected(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<cartograph_core::Error> for CliError {
    fn from(value: cartograph_core::Error) -> Self {
        Self::Core(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Parse,
    Tiles,
    Document,
    Query,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    pretty: bool,
    config: Option<String>,
    catalog: Option<String>,
    group: Option<String>,
    save_unparsed: bool,
    plain: bool,
    rtl: bool,
    css: bool,
    width: f64,
    height: f64,
    gzip_out: Option<String>,
    groups: Option<String>,
    pages: Option<Vec<PageId>>,
    limit: Option<usize>,
    continue_from: Option<PageId>,
}

#[derive(Debug, Deserialize)]
struct TagIn {
    tag: String,
    #[serde(default)]
    input: String,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct DocumentOut {
    html: Vec<String>,
    groups: PersistedGroups,
    tracking_categories: Vec<&'static str>,
}

fn usage() -> &'static str {
    "cartograph-cli\n\
\n\
USAGE:\n\
  cartograph-cli [parse] [--pretty] [--group <name>] [--save-unparsed] [--plain] [--gzip-out <path>] [<path>|-]\n\
  cartograph-cli tiles [--pretty] [--css] [--width <px>] [--height <px>] [--config <path>] [--catalog <path>] <mapid/zoom/plane/lon/lat>\n\
  cartograph-cli document [--pretty] [--rtl] [--plain] [--config <path>] [--catalog <path>] [<path>|-]\n\
  cartograph-cli query [--pretty] [--groups <a|b>] [--pages <1,2>] [--limit <n>] [--continue <page>] <dir>\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - parse prints the persisted group data of one GeoJSON snippet.\n\
  - document reads a JSON list of {\"tag\", \"input\", \"attrs\"} objects in document order.\n\
  - query reads <page>.json or <page>.json.gz artifacts from <dir>.\n\
  - Logging is controlled by CARTOGRAPH_LOG (or RUST_LOG); the default level is warn.\n\
"
}

fn next_value<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<&'a String, CliError> {
    it.next().ok_or(CliError::Usage(usage()))
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T, CliError> {
    raw.trim().parse::<T>().map_err(|_| CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args {
        command: Command::Parse,
        width: 300.0,
        height: 300.0,
        ..Default::default()
    };

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "parse" => args.command = Command::Parse,
            "tiles" => args.command = Command::Tiles,
            "document" => args.command = Command::Document,
            "query" => args.command = Command::Query,
            "--pretty" => args.pretty = true,
            "--save-unparsed" => args.save_unparsed = true,
            "--plain" => args.plain = true,
            "--rtl" => args.rtl = true,
            "--css" => args.css = true,
            "--config" => args.config = Some(next_value(&mut it)?.clone()),
            "--catalog" => args.catalog = Some(next_value(&mut it)?.clone()),
            "--group" => {
                let group = next_value(&mut it)?;
                if !is_valid_group_name(group) {
                    return Err(CliError::BadValue(format!(
                        "invalid group name {group:?}: expected ASCII letters and digits"
                    )));
                }
                args.group = Some(group.clone());
            }
            "--gzip-out" => args.gzip_out = Some(next_value(&mut it)?.clone()),
            "--groups" => args.groups = Some(next_value(&mut it)?.clone()),
            "--width" => args.width = parse_number(next_value(&mut it)?)?,
            "--height" => args.height = parse_number(next_value(&mut it)?)?,
            "--limit" => args.limit = Some(parse_number(next_value(&mut it)?)?),
            "--continue" => args.continue_from = Some(parse_number(next_value(&mut it)?)?),
            "--pages" => {
                let raw = next_value(&mut it)?;
                let pages = raw
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(parse_number::<PageId>)
                    .collect::<Result<Vec<PageId>, _>>()?;
                args.pages = Some(pages);
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') && !looks_like_location(other) => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if matches!(args.command, Command::Tiles | Command::Query) && args.input.is_none() {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

/// Location paths may start with a negative map id, e.g. `-1/2/0/3200/3200`.
fn looks_like_location(arg: &str) -> bool {
    arg.len() > 1 && arg.as_bytes()[1].is_ascii_digit() && arg.contains('/')
}

fn init_logging() {
    let filter = std::env::var("CARTOGRAPH_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

fn load_config(path: Option<&str>) -> Result<SiteConfig, CliError> {
    match path {
        Some(path) => Ok(SiteConfig::from_json_str(&std::fs::read_to_string(path)?)?),
        None => Ok(SiteConfig::defaults()),
    }
}

fn load_catalog(path: Option<&str>) -> Result<MapCatalog, CliError> {
    match path {
        Some(path) => Ok(MapCatalog::from_json_str(&std::fs::read_to_string(path)?)?),
        None => Ok(MapCatalog::default()),
    }
}

fn renderer(plain: bool) -> &'static dyn InlineRenderer {
    if plain { &PlainTextRenderer } else { &HtmlInlineRenderer }
}

fn run_parse(args: &Args) -> Result<(), CliError> {
    let text = read_input(args.input.as_deref())?;
    let options = PipelineOptions {
        save_unparsed: args.save_unparsed,
    };
    let pipeline = GeodataPipeline::with_options(renderer(args.plain), options);

    let features = match pipeline.process(&text) {
        Err(policy) => return Err(CliError::Rejected(policy.to_string())),
        Ok(Err(diagnostics)) => {
            return Err(CliError::Rejected(diagnostics.composite_message("parse")));
        }
        Ok(Ok(features)) => features,
    };

    let mut aggregator = GroupAggregator::new();
    aggregator.contribute(args.group.as_deref(), features);
    aggregator.mark_valid();
    let groups = aggregator.finalize();

    if let Some(path) = &args.gzip_out {
        std::fs::write(path, persist::encode(&groups)?)?;
        tracing::info!(path = %path, "wrote compressed group data");
    }
    write_json(&groups, args.pretty)
}

fn run_tiles(args: &Args) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let catalog = load_catalog(args.catalog.as_deref())?;
    let path = args.input.as_deref().unwrap_or_default();

    let location = MapLocation::parse(path, &TileGridConfig::default())?;
    let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::from_config(&config));
    let grid = compositor.compose(&location.position(pixel_size(args.width, args.height)));

    if args.css {
        println!("{}", grid.css_style());
        Ok(())
    } else {
        write_json(&grid, args.pretty)
    }
}

fn run_document(args: &Args) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let catalog = load_catalog(args.catalog.as_deref())?;
    let tags: Vec<TagIn> = serde_json::from_str(&read_input(args.input.as_deref())?)?;

    let mut context = DocumentContext::new(&config, &catalog, renderer(args.plain)).with_rtl(args.rtl);
    let mut html = Vec::with_capacity(tags.len());
    for tag in tags {
        let kind: TagKind = tag.tag.parse().map_err(CliError::Rejected)?;
        let attrs: TagArgs = tag.attrs.into_iter().collect();
        html.push(context.process_tag(kind, &tag.input, &attrs));
    }

    let output = context.finish();
    write_json(
        &DocumentOut {
            html,
            groups: output.groups,
            tracking_categories: output.tracking_categories,
        },
        args.pretty,
    )
}

/// Loads `<page>.json` and `<page>.json.gz` artifacts; other files are ignored.
fn load_store(dir: &Path) -> Result<BTreeMap<PageId, PersistedGroups>, CliError> {
    let mut store = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let (stem, compressed) = if let Some(stem) = name.strip_suffix(".json.gz") {
            (stem, true)
        } else if let Some(stem) = name.strip_suffix(".json") {
            (stem, false)
        } else {
            continue;
        };
        let Ok(page) = stem.parse::<PageId>() else {
            tracing::debug!(file = %name, "skipping artifact without a page id");
            continue;
        };
        let groups = if compressed {
            persist::decode(&std::fs::read(&path)?)?
        } else {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        };
        store.insert(page, groups);
    }
    Ok(store)
}

fn run_query(args: &Args) -> Result<(), CliError> {
    let dir = args.input.as_deref().unwrap_or(".");
    let store = load_store(Path::new(dir))?;

    let mut query = MapDataQuery {
        pages: args.pages.clone(),
        continue_from: args.continue_from,
        ..Default::default()
    };
    if let Some(limit) = args.limit {
        query.limit = limit;
    }
    if let Some(groups) = &args.groups {
        query = query.with_group_list(groups);
    }
    write_json(&retrieval::query_map_data(&store, &query), args.pretty)
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Parse => run_parse(&args),
        Command::Tiles => run_tiles(&args),
        Command::Document => run_document(&args),
        Command::Query => run_query(&args),
    }
}

fn main() {
    init_logging();

    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err @ CliError::BadValue(_)) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match run(args) {
        Ok(()) => {}
        Err(err @ CliError::Rejected(_)) => {
            eprintln!("{err}");
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
