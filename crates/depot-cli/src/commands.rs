use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use depot_core::{
    Catalog, ContentHash, Depot, DepotConfig, Page, PageParams, ReleaseKey, ReleaseSubmission,
    StorageBackend, StoredRelease,
};
use depot_server::DepotServer;
use depot_types::{FileMap, ProjectMetadata};
use serde::Serialize;
use walkdir::WalkDir;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let depot = Depot::open(&config)?;
            dispatch(cli, config, depot)
        }
        StorageBackend::Memory => {
            tracing::warn!("memory backend: nothing will be kept after exit");
            let depot = Depot::in_memory(&config.coordinator);
            dispatch(cli, config, depot)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<DepotConfig> {
    let mut config = match &cli.config {
        Some(path) => DepotConfig::load(path)?,
        None => DepotConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    Ok(config)
}

fn dispatch<C: Catalog + 'static>(
    cli: Cli,
    config: DepotConfig,
    depot: Depot<C>,
) -> anyhow::Result<()> {
    let out = Output(cli.format);
    match cli.command {
        Command::Serve(args) => cmd_serve(args, config, depot),
        Command::Check(args) => cmd_check(out, &depot, args),
        Command::Put(args) => cmd_put(out, &depot, args),
        Command::Get(args) => cmd_get(&depot, args),
        Command::Publish(args) => cmd_publish(out, &depot, args),
        Command::Show(args) => cmd_show(out, &depot, args),
        Command::Cat(args) => cmd_cat(&depot, args),
        Command::Delete(args) => cmd_delete(out, &depot, args),
        Command::Refs(args) => cmd_refs(out, &depot, args),
        Command::Owners => cmd_owners(out, &depot),
        Command::Projects(args) => cmd_projects(out, &depot, args, config.server.default_page_size),
        Command::Commits(args) => cmd_commits(out, &depot, args, config.server.default_page_size),
    }
}

#[derive(Clone, Copy)]
struct Output(OutputFormat);

impl Output {
    /// Print `value` as JSON, or run `text` for human output.
    fn emit<T: Serialize>(self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.0 {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }
}

fn release_key(args: &ReleaseArgs) -> anyhow::Result<ReleaseKey> {
    Ok(ReleaseKey::new(&args.owner, &args.project, &args.revision)?)
}

fn parse_hashes(raw: &[String]) -> anyhow::Result<BTreeSet<ContentHash>> {
    raw.iter()
        .map(|s| ContentHash::new(s.as_str()).map_err(anyhow::Error::from))
        .collect()
}

fn cmd_serve<C: Catalog + 'static>(
    args: ServeArgs,
    config: DepotConfig,
    depot: Depot<C>,
) -> anyhow::Result<()> {
    let mut server_config = config.server;
    if let Some(bind) = args.bind {
        server_config.bind_addr = bind;
    }
    println!(
        "{} depot serving {} on {}",
        "✓".green().bold(),
        config.storage.data_dir.display().to_string().bold(),
        server_config.bind_addr.to_string().cyan()
    );
    let server = DepotServer::new(Arc::new(depot), server_config);
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_check<C: Catalog>(out: Output, depot: &Depot<C>, args: CheckArgs) -> anyhow::Result<()> {
    let asked = parse_hashes(&args.hashes)?;
    let found = depot.check_hashes(&asked)?;
    out.emit(&found, || {
        for hash in &asked {
            if found.contains(hash) {
                println!("  {} {}", "stored ".green(), hash);
            } else {
                println!("  {} {}", "missing".yellow(), hash);
            }
        }
    })
}

fn cmd_put<C: Catalog>(out: Output, depot: &Depot<C>, args: PutArgs) -> anyhow::Result<()> {
    let hash = ContentHash::new(args.hash)?;
    let bytes =
        fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let written = depot.store_object(&hash, &bytes)?;
    let report = serde_json::json!({ "hash": hash, "size": bytes.len(), "written": written });
    out.emit(&report, || {
        if written {
            println!("{} stored {} ({} bytes)", "✓".green().bold(), hash.as_str().yellow(), bytes.len());
        } else {
            println!("{} {} already stored", "✓".green(), hash.as_str().yellow());
        }
    })
}

fn cmd_get<C: Catalog>(depot: &Depot<C>, args: GetArgs) -> anyhow::Result<()> {
    let hash = ContentHash::new(args.hash)?;
    let bytes = depot.fetch_object(&hash)?;
    write_bytes(args.output.as_deref(), &bytes)
}

fn write_bytes(output: Option<&Path>, bytes: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Every regular file under `root`, keyed by its `/`-separated relative path.
fn collect_files(root: &Path) -> anyhow::Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by(|a, b| a.path().cmp(b.path())) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root)?;
        let logical = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(logical, entry.path().to_path_buf());
    }
    Ok(files)
}

#[derive(Serialize)]
struct PublishReport {
    release: String,
    files: usize,
    uploaded: usize,
    superseded: usize,
}

fn cmd_publish<C: Catalog>(out: Output, depot: &Depot<C>, args: PublishArgs) -> anyhow::Result<()> {
    let files = collect_files(&args.dir)?;
    let mut file_map = FileMap::new();
    let mut sources: BTreeMap<ContentHash, &PathBuf> = BTreeMap::new();
    for (logical, path) in &files {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let hash = ContentHash::digest(&bytes);
        sources.entry(hash.clone()).or_insert(path);
        file_map.insert(logical.clone(), hash);
    }

    let wanted: BTreeSet<ContentHash> = sources.keys().cloned().collect();
    let present = depot.check_hashes(&wanted)?;
    let mut uploaded = 0;
    for hash in wanted.difference(&present) {
        let path = sources[hash];
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        depot.store_object(hash, &bytes)?;
        uploaded += 1;
        tracing::debug!(hash = %hash.short(), path = %path.display(), "uploaded");
    }

    let metadata = match &args.metadata {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ProjectMetadata::try_from(serde_json::from_str::<serde_json::Value>(&raw)?)
                .with_context(|| format!("{} must hold a JSON object", path.display()))?
        }
        None => ProjectMetadata::default(),
    };

    let release = args.release;
    let submission = ReleaseSubmission {
        author: args.author.unwrap_or_else(|| release.owner.clone()),
        owner: release.owner,
        project: release.project,
        revision: release.revision,
        files: file_map,
        metadata,
        time: args.time,
    };
    let name = format!(
        "{}/{}/{}",
        submission.owner, submission.project, submission.revision
    );
    let outcome = depot.submit_release(submission)?;
    if !outcome.is_committed() {
        let missing: Vec<&str> = outcome.missing.iter().map(ContentHash::as_str).collect();
        bail!("release {name} rejected, objects missing: {}", missing.join(", "));
    }

    let report = PublishReport {
        release: name,
        files: files.len(),
        uploaded,
        superseded: outcome.superseded,
    };
    out.emit(&report, || {
        println!("{} Published {}", "✓".green().bold(), report.release.yellow().bold());
        println!("  Files: {} ({} uploaded, {} deduplicated)", report.files, uploaded, wanted.len() - uploaded);
        if report.superseded > 0 {
            println!("  Replaced {} previous manifest(s)", report.superseded);
        }
    })
}

fn print_release(row: &StoredRelease) {
    let m = &row.manifest;
    println!("{}  #{}", m.key.to_string().yellow().bold(), row.id);
    println!("  Author: {}", m.author);
    println!("  Time:   {}", m.time);
    if !m.metadata.is_empty() {
        println!("  Meta:   {}", m.metadata.clone().into_value());
    }
    for (path, hash) in &m.files {
        println!("  {}  {}", hash.short().dimmed(), path);
    }
}

fn cmd_show<C: Catalog>(out: Output, depot: &Depot<C>, args: ShowArgs) -> anyhow::Result<()> {
    let key = release_key(&args.release)?;
    if args.all {
        let rows = depot.query_release(&key)?;
        out.emit(&rows, || {
            if rows.is_empty() {
                println!("No release {}.", key.to_string().yellow());
            }
            rows.iter().for_each(print_release);
        })
    } else {
        let row = depot.get_commit(&key)?;
        out.emit(&row, || print_release(&row))
    }
}

fn cmd_cat<C: Catalog>(depot: &Depot<C>, args: CatArgs) -> anyhow::Result<()> {
    let key = release_key(&args.release)?;
    let (_, bytes) = depot.fetch_release_file(&key, &args.path)?;
    write_bytes(None, &bytes)
}

fn cmd_delete<C: Catalog>(out: Output, depot: &Depot<C>, args: DeleteArgs) -> anyhow::Result<()> {
    let key = release_key(&args.release)?;
    let deleted = depot.delete_release(&key)?;
    out.emit(&serde_json::json!({ "deleted": deleted }), || {
        if deleted == 0 {
            println!("No release {}.", key.to_string().yellow());
        } else {
            println!("{} Deleted {}", "✓".green().bold(), key.to_string().yellow());
        }
    })
}

fn cmd_refs<C: Catalog>(out: Output, depot: &Depot<C>, args: RefsArgs) -> anyhow::Result<()> {
    let asked = parse_hashes(&args.hashes)?;
    let refs = depot.query_references(&asked)?;
    out.emit(&refs, || {
        for hash in &asked {
            match refs.get(hash) {
                None => println!("{} {}", hash.as_str().yellow(), "(unknown)".dimmed()),
                Some(list) if list.is_empty() => {
                    println!("{} {}", hash.as_str().yellow(), "(unreferenced)".dimmed())
                }
                Some(list) => {
                    println!("{}", hash.as_str().yellow());
                    for reference in list {
                        println!("  {reference}");
                    }
                }
            }
        }
    })
}

fn cmd_owners<C: Catalog>(out: Output, depot: &Depot<C>) -> anyhow::Result<()> {
    let owners = depot.list_owners()?;
    out.emit(&owners, || {
        for owner in &owners {
            println!("{owner}");
        }
    })
}

fn print_page_footer<T>(page: &Page<T>) {
    if page.items.is_empty() {
        println!("{}", "(none)".dimmed());
    }
    println!(
        "{}",
        format!(
            "showing {} of {} (offset {})",
            page.items.len(),
            page.total,
            page.offset
        )
        .dimmed()
    );
}

fn cmd_projects<C: Catalog>(
    out: Output,
    depot: &Depot<C>,
    args: ProjectsArgs,
    default_size: usize,
) -> anyhow::Result<()> {
    let request = PageParams::from(args.page).into_request(default_size);
    let page = depot.list_projects(args.owner.as_deref(), request)?;
    out.emit(&page, || {
        for s in &page.items {
            println!(
                "{}/{}  {}  {}  {}",
                s.owner.bold(),
                s.project.bold(),
                s.revision.yellow(),
                s.author,
                s.time.to_string().dimmed()
            );
        }
        print_page_footer(&page);
    })
}

fn cmd_commits<C: Catalog>(
    out: Output,
    depot: &Depot<C>,
    args: CommitsArgs,
    default_size: usize,
) -> anyhow::Result<()> {
    let request = PageParams::from(args.page).into_request(default_size);
    let page = depot.list_commits(&args.owner, &args.project, request)?;
    out.emit(&page, || {
        for row in &page.items {
            let m = &row.manifest;
            println!(
                "{}  {}  {} files  {}",
                m.key.revision.yellow(),
                m.author,
                m.files.len(),
                m.time.to_string().dimmed()
            );
        }
        print_page_footer(&page);
    })
}
