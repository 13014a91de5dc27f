// locarchctl -- headless CLI for the Locarch archive core. Talks to the same
// `locarch_lib` the desktop app embeds: init an archive, run an import,
// list locations, drain the job queue, validate a bag, import a reference
// map, and scan for merge candidates, all without a webview.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use locarch_lib::db::{self, open_db, schema};
use locarch_lib::media_path::MediaPathPlanner;
use locarch_lib::{bagit, constants, hash, import, jobs, merge, refmap};

#[derive(Parser)]
#[command(name = "locarchctl")]
#[command(about = "Locarch archive core - command line interface", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new archive at the given path (provisions the folder
    /// skeleton and catalog database).
    Init { path: PathBuf },

    /// Register a location and start an import of one or more source paths.
    Import {
        /// Archive root (defaults to current directory)
        #[arg(short, long)]
        archive: Option<PathBuf>,
        /// Location name (a new location is created if none matches)
        #[arg(long)]
        location: String,
        /// Source files or directories to import
        sources: Vec<PathBuf>,
    },

    /// List locations in the archive.
    List {
        #[arg(short, long)]
        archive: Option<PathBuf>,
    },

    /// Show a single location's details.
    Show {
        #[arg(short, long)]
        archive: Option<PathBuf>,
        id: String,
    },

    /// List and run queued jobs.
    Jobs {
        #[arg(short, long)]
        archive: Option<PathBuf>,
        /// Filter by queue name
        #[arg(long)]
        queue: Option<String>,
        /// Run every pending job on the named queue (all queues if omitted)
        #[arg(long)]
        run: bool,
    },

    /// Validate a location's BagIt manifest against the files on disk.
    ValidateBag {
        #[arg(short, long)]
        archive: Option<PathBuf>,
        location_id: String,
    },

    /// Import a reference map (KML/KMZ/GPX/GeoJSON/CSV) of named points.
    ImportRefMap {
        #[arg(short, long)]
        archive: Option<PathBuf>,
        /// A label for this reference map
        name: String,
        file: PathBuf,
    },

    /// Scan the catalog for locations that look like the same place.
    MergeScan {
        #[arg(short, long)]
        archive: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => cmd_init(path),
        Commands::Import { archive, location, sources } => cmd_import(archive, location, sources),
        Commands::List { archive } => cmd_list(archive),
        Commands::Show { archive, id } => cmd_show(archive, id),
        Commands::Jobs { archive, queue, run } => cmd_jobs(archive, queue, run),
        Commands::ValidateBag { archive, location_id } => cmd_validate_bag(archive, location_id),
        Commands::ImportRefMap { archive, name, file } => cmd_import_ref_map(archive, name, file),
        Commands::MergeScan { archive } => cmd_merge_scan(archive),
    }
}

fn cmd_init(path: PathBuf) -> Result<()> {
    let archive_root = path.canonicalize().unwrap_or(path.clone());
    let db_path = archive_root.join(constants::ARCHIVE_FOLDER).join(constants::DB_FILENAME);
    if db_path.exists() {
        bail!("Archive already exists at {}", archive_root.display());
    }

    db::open_archive(&archive_root)?;

    println!("Initialized archive at {}", archive_root.display());
    println!("Structure created:");
    println!("  .locarch/catalog.db   - Catalog database");
    println!("  .locarch/thumbnails/  - Thumbnails");
    println!("  .locarch/proxies/     - Proxy videos");
    println!("  locations/            - Archived location media");

    Ok(())
}

fn cmd_import(archive: Option<PathBuf>, location_name: String, sources: Vec<PathBuf>) -> Result<()> {
    let archive_root = resolve_archive_root(archive)?;
    let (conn, planner) = open_archive(&archive_root)?;

    if sources.is_empty() {
        bail!("no source paths given");
    }

    let location_id = find_or_create_location(&conn, &planner, &location_name)?;

    let source_paths: Vec<String> = sources
        .iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()).to_string_lossy().to_string())
        .collect();
    let source_paths_json = serde_json::to_string(&source_paths)?;
    let session_id = schema::create_import_session(&conn, &location_id, &source_paths_json)?;

    let payload = serde_json::to_string(&serde_json::json!({ "import_session_id": session_id }))?;
    let job_id = jobs::create_job(&conn, "import", 10, &payload, None, constants::JOB_MAX_ATTEMPTS)?;

    println!("Created import session {} (job {}) for location '{}'", session_id, job_id, location_name);
    println!("Running import...");

    while jobs::runner::run_next_job(&conn, &planner, "import", None)? {}

    let session = schema::get_import_session(&conn, session_id)?
        .ok_or_else(|| anyhow::anyhow!("import session {} vanished", session_id))?;
    println!("Import finished: status={}", session.status);

    Ok(())
}

fn find_or_create_location(conn: &rusqlite::Connection, planner: &MediaPathPlanner, name: &str) -> Result<String> {
    for loc in schema::list_locations(conn)? {
        if loc.name.eq_ignore_ascii_case(name) {
            return Ok(loc.id);
        }
    }
    let now = chrono::Utc::now().to_rfc3339();
    let id = hash::derive_entity_id(&now, name);
    schema::insert_location(conn, &id, name, None, None, None)?;
    planner.ensure_location_directories(&id)?;
    Ok(id)
}

fn cmd_list(archive: Option<PathBuf>) -> Result<()> {
    let archive_root = resolve_archive_root(archive)?;
    let (conn, _planner) = open_archive(&archive_root)?;

    let locations = schema::list_locations(&conn)?;
    if locations.is_empty() {
        println!("No locations found. Use 'locarchctl import' to add one.");
        return Ok(());
    }

    println!("{:<18}  {:>6}  {:>6}  {:>6}  {}", "ID", "Imgs", "Vids", "Docs", "Name");
    println!("{}", "-".repeat(70));
    for loc in locations {
        println!(
            "{:<18}  {:>6}  {:>6}  {:>6}  {}",
            loc.id, loc.media_image_count, loc.media_video_count, loc.media_document_count, loc.name
        );
    }

    Ok(())
}

fn cmd_show(archive: Option<PathBuf>, id: String) -> Result<()> {
    let archive_root = resolve_archive_root(archive)?;
    let (conn, _planner) = open_archive(&archive_root)?;

    let location = schema::get_location(&conn, &id)?.ok_or_else(|| anyhow::anyhow!("location {} not found", id))?;

    println!("Location {}", location.id);
    println!("  Name:        {}", location.name);
    if let Some(ref category) = location.category {
        println!("  Category:    {}", category);
    }
    if let (Some(lat), Some(lng)) = (location.gps_lat, location.gps_lng) {
        println!("  GPS:         {:.6}, {:.6}", lat, lng);
    }
    println!("  Bagit:       {}", location.bagit_status);
    println!("  Media:       {} images, {} videos, {} documents, {} maps ({})",
        location.media_image_count,
        location.media_video_count,
        location.media_document_count,
        location.media_map_count,
        format_size(location.media_total_bytes),
    );
    println!("  Created:     {}", location.created_at);

    let timeline = locarch_lib::timeline::list_for_location(&conn, &id)?;
    if !timeline.is_empty() {
        println!();
        println!("Timeline:");
        for event in timeline {
            println!("  {} [{}] {}", event.start_date, event.event_type, event.description.as_deref().unwrap_or(""));
        }
    }

    Ok(())
}

fn cmd_jobs(archive: Option<PathBuf>, queue: Option<String>, run: bool) -> Result<()> {
    let archive_root = resolve_archive_root(archive)?;
    let (conn, planner) = open_archive(&archive_root)?;

    if run {
        let queues: Vec<&str> = match &queue {
            Some(q) => vec![q.as_str()],
            None => jobs::runner::known_queues().to_vec(),
        };
        let mut total = 0;
        for q in queues {
            let count = jobs::runner::run_all_jobs(&conn, &planner, q)?;
            total += count;
            if count > 0 {
                println!("  {}: ran {} job(s)", q, count);
            }
        }
        println!("Ran {} job(s) total", total);
        return Ok(());
    }

    let jobs_list = schema::list_jobs(&conn, queue.as_deref(), None, 50)?;
    if jobs_list.is_empty() {
        println!("No jobs found.");
    } else {
        println!("{:>5}  {:<22}  {:>10}  {:>4}  {:>20}", "ID", "Queue", "Status", "Try", "Created");
        println!("{}", "-".repeat(70));
        for job in jobs_list {
            println!(
                "{:>5}  {:<22}  {:>10}  {:>4}  {:>20}",
                job.id, job.queue, job.status, job.attempts, job.created_at
            );
        }
    }

    let pending = jobs::count_pending_by_queue(&conn)?;
    if !pending.is_empty() {
        println!();
        println!("Pending:");
        for (queue_name, count) in pending {
            println!("  {}: {}", queue_name, count);
        }
    }

    Ok(())
}

fn cmd_validate_bag(archive: Option<PathBuf>, location_id: String) -> Result<()> {
    let archive_root = resolve_archive_root(archive)?;
    let (conn, planner) = open_archive(&archive_root)?;

    let validation = bagit::validate_bag(&conn, &planner, &location_id)?;

    println!("Bag validation for location {}", location_id);
    println!("  Files checked: {}", validation.files_checked);
    println!("  Mismatches:    {}", validation.mismatches);
    println!("  Missing:       {}", validation.missing);
    println!("  Valid:         {}", validation.valid);

    Ok(())
}

fn cmd_import_ref_map(archive: Option<PathBuf>, name: String, file: PathBuf) -> Result<()> {
    let archive_root = resolve_archive_root(archive)?;
    let (conn, _planner) = open_archive(&archive_root)?;

    let ref_map_id = refmap::import_ref_map_file(&conn, &name, &file, None)?;
    let points = schema::list_ref_map_points(&conn, ref_map_id)?;

    println!("Imported reference map '{}' ({} points)", name, points.len());

    Ok(())
}

fn cmd_merge_scan(archive: Option<PathBuf>) -> Result<()> {
    let archive_root = resolve_archive_root(archive)?;
    let (conn, _planner) = open_archive(&archive_root)?;

    let suggestions = merge::find_merge_candidates(&conn)?;
    if suggestions.is_empty() {
        println!("No merge candidates found.");
        return Ok(());
    }

    println!("{:<18}  {:<18}  {:>8}  {:>7}  {:>10}", "Location A", "Location B", "Type", "Auto", "Distance");
    println!("{}", "-".repeat(70));
    for s in suggestions {
        let distance = s.decision.distance_m.map(|d| format!("{:.0}m", d)).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<18}  {:<18}  {:>8}  {:>7}  {:>10}",
            s.location_a, s.location_b, s.decision.match_type, s.decision.auto_merge, distance
        );
    }

    Ok(())
}

// --- Helper Functions -------------------------------------------------

fn resolve_archive_root(archive: Option<PathBuf>) -> Result<PathBuf> {
    let path = archive.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let path = path.canonicalize().unwrap_or(path);

    let db_path = path.join(constants::ARCHIVE_FOLDER).join(constants::DB_FILENAME);
    if !db_path.exists() {
        bail!("No archive found at {}. Use 'locarchctl init <path>' to create one.", path.display());
    }

    Ok(path)
}

fn open_archive(archive_root: &PathBuf) -> Result<(rusqlite::Connection, MediaPathPlanner)> {
    let planner = MediaPathPlanner::new(archive_root);
    let conn = open_db(&planner.db_path())?;
    Ok((conn, planner))
}

fn format_size(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = KB * 1024;
    const GB: i64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
