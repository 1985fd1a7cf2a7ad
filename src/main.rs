use clap::{Parser, Subcommand};
use gdr_cam::capture::{self, CaptureConfig};
use gdr_cam::export::{Exporter, render_processor};
use gdr_cam::imaging::{RustBackend, exif};
use gdr_cam::session::Session;
use gdr_cam::store::{PageCursor, PhotoStore};
use gdr_cam::types::{FormInput, GeoFix};
use gdr_cam::worker::Dispatcher;
use gdr_cam::{config, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "gdr-cam")]
#[command(about = "Field inspection photos with embedded GPS and inspection metadata")]
#[command(long_about = "\
Field inspection photos with embedded GPS and inspection metadata

Each captured photo is straightened, cropped to 16:9 (or 9:16 when portrait),
tagged with an EXIF block carrying GPS coordinates and the inspection form as
JSON, and saved to a local SQLite gallery. Exports burn a north arrow, the GPS
line and the capture time into the pixels.

Data directory layout:

  gdr-cam-data/
  ├── config.toml          # Optional, see 'gdr-cam gen-config'
  └── gdr-cam.sqlite3      # Photo store

Location fixes are given with --fix lat,lng,accuracy (repeatable) or as a
JSON-lines file with --fixes. The most accurate fix is recorded.

Log verbosity follows RUST_LOG (default: gdr_cam=info); logs go to stderr.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the photo database
    #[arg(long, default_value = "gdr-cam-data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Inspection form fields. Unset fields fall back to the last saved form.
#[derive(clap::Args, Clone, Default)]
struct FormArgs {
    /// Work front
    #[arg(long)]
    work_front: Option<String>,
    /// Coronation value
    #[arg(long)]
    coronation: Option<String>,
    /// Activity performed
    #[arg(long)]
    activity: Option<String>,
    /// Observation category
    #[arg(long)]
    category: Option<String>,
}

impl FormArgs {
    fn over(self, defaults: FormInput) -> FormInput {
        FormInput {
            work_front: self.work_front.or(defaults.work_front),
            coronation: self.coronation.or(defaults.coronation),
            activity: self.activity.or(defaults.activity),
            observation_category: self.category.or(defaults.observation_category),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Capture a photo: straighten, crop, tag and save it
    Capture {
        /// Raw image file (JPEG, PNG or WebP)
        image: PathBuf,
        #[command(flatten)]
        form: FormArgs,
        /// Location fix as lat,lng,accuracy_m (repeatable)
        #[arg(long = "fix", value_parser = parse_fix)]
        fixes: Vec<GeoFix>,
        /// JSON-lines file of location fixes
        #[arg(long = "fixes")]
        fixes_file: Option<PathBuf>,
        /// Save with location and timestamp only
        #[arg(long)]
        no_form: bool,
        /// Also write the working copy with its overlay into this directory
        #[arg(long)]
        download: Option<PathBuf>,
    },
    /// List saved photos, newest first
    List {
        /// Continue after this cursor (printed at the end of the previous page)
        #[arg(long)]
        after: Option<PageCursor>,
    },
    /// Show a photo's record and its embedded metadata
    Show { id: i64 },
    /// Export photos: one JPEG for a single id, a zip for several
    Export {
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Delete photos
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn parse_fix(s: &str) -> Result<GeoFix, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [lat, lng, acc] = parts.as_slice() else {
        return Err("expected lat,lng,accuracy".into());
    };
    let num = |v: &str| v.parse::<f64>().map_err(|e| format!("{v}: {e}"));
    Ok(GeoFix::new(
        num(lat)?,
        num(lng)?,
        num(acc)?,
        chrono::Utc::now().timestamp_millis(),
    ))
}

fn read_fixes(path: &Path) -> Result<Vec<GeoFix>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let mut fixes = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        fixes.push(serde_json::from_str(line)?);
    }
    Ok(fixes)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "gdr_cam=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    std::fs::create_dir_all(&cli.data_dir)?;
    let app_config = config::load_config(&cli.data_dir)?;
    let store = PhotoStore::open(&app_config.store_path(&cli.data_dir))?;
    let backend = Arc::new(RustBackend::new());

    match cli.command {
        Command::Capture {
            image,
            form,
            fixes,
            fixes_file,
            no_form,
            download,
        } => {
            let capture_config: CaptureConfig = app_config.capture_config();
            let mut session = Session::new();
            if let Some(path) = fixes_file {
                for fix in read_fixes(&path)? {
                    session.update_fix(fix);
                }
            }
            for fix in fixes {
                session.update_fix(fix);
            }

            let raw = std::fs::read(&image)?;
            capture::prepare(backend.as_ref(), &mut session, &raw, &capture_config)?;

            if let Some(dir) = download {
                let (name, bytes) =
                    capture::download_working_copy(backend.as_ref(), &session, &capture_config)?;
                std::fs::create_dir_all(&dir)?;
                let path = dir.join(name);
                std::fs::write(&path, bytes)?;
                println!("Saved {}", path.display());
            }

            let id = if no_form {
                capture::save_without_form(&store, backend.as_ref(), &mut session, &capture_config)
                    .await?
            } else {
                let form = form.over(capture::prefill_form(&store).await?);
                capture::save_with_form(
                    &store,
                    backend.as_ref(),
                    &mut session,
                    &form,
                    &capture_config,
                )
                .await?
            };
            for line in output::format_saved(id, &session.gps_status()) {
                println!("{}", line);
            }
        }
        Command::List { after } => {
            let page = store.page_newest(after, app_config.store.page_size).await?;
            output::print_list_output(&page);
        }
        Command::Show { id } => match store.get(id).await? {
            Some(record) => {
                let block = exif::decode(&record.image)?;
                output::print_show_output(&record, &block);
            }
            None => return Err(format!("photo {id} not found").into()),
        },
        Command::Export { ids, out } => {
            let export_config = app_config.export_config();
            let dispatcher = Dispatcher::spawn(
                render_processor(Arc::clone(&backend), export_config.transform),
                app_config.worker_timeout(),
            )?;
            let exporter = Exporter::new(store.clone(), backend, dispatcher, export_config);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_export_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = exporter.export_selected(&ids, Some(tx)).await;
            printer.join().map_err(|_| "output thread panicked")?;
            let outcome = result?;
            let path = outcome.write_to(&out)?;
            output::print_export_result(&outcome, &path);
        }
        Command::Delete { ids } => {
            let removed = store.delete_many(&ids).await?;
            for line in output::format_deleted(ids.len(), removed) {
                println!("{}", line);
            }
        }
        // Printed before the store is opened
        Command::GenConfig => {}
    }

    store.close();
    Ok(())
}
