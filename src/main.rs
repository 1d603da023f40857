use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::PathBuf;

use lecture_map::config::{CONFIG_ENV, Config};
use lecture_map::export::{stats_to_csv, stats_to_json, stats_to_text};
use lecture_map::import::{import_files, remove_imported};
use lecture_map::markers::markers_for_view;
use lecture_map::views::{Upsert, View, ViewCatalog};
use lecture_map::{
    Coordinate, CoordinateCache, EventForm, EventStore, GeoResolver, LoadNotice, Loaded, Offline,
    RecomputeOutcome, load_or_init, open_store, recompute_and_save,
};

#[derive(Parser)]
#[command(name = "lecture-map", version, about = "Record outreach events and aggregate them for the map")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Workbook (.xlsx) or snapshot (.bin.gz) to use instead of the configured one
    #[arg(long, global = true)]
    workbook: Option<PathBuf>,

    /// Never contact the geocoding service
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record one event and recalculate the statistics
    Add(AddArgs),
    /// Rebuild the statistics from scratch, geocoding every group again
    Recalc,
    /// Import events from spreadsheet or CSV files
    Import {
        files: Vec<PathBuf>,
        /// Delete input files whose rows were all imported
        #[arg(long)]
        remove_imported: bool,
    },
    /// Print the statistics table
    Stats {
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Suggest address fields for an institution name
    Lookup { name: String },
    /// Manage map views
    Views {
        #[command(subcommand)]
        action: ViewsCommand,
    },
    /// Print the markers for a view as JSON
    Markers { view: String },
    /// Copy the workbook into the archive directory
    Archive {
        /// Start over with empty tables after archiving
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Event date, defaults to today
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    name: String,
    #[arg(long)]
    address: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: String,
    #[arg(long = "plz")]
    postal_code: String,
    #[arg(long)]
    tables: String,
    #[arg(long)]
    participants: String,
    /// Known latitude, skips the lookup for a new institution
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Known longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
}

#[derive(Subcommand)]
enum ViewsCommand {
    /// List all views
    List,
    /// Add a view or update the one with the same name
    Add {
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        llc_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        llc_lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        urc_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        urc_lon: f64,
    },
    /// Remove a view
    Remove { name: String },
    /// Build a view from a city search
    Lookup {
        city: String,
        state: String,
        /// Store the view instead of only printing it
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Csv,
    Json,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(workbook) = cli.workbook {
        config.workbook_path = workbook;
    }

    match cli.command {
        Command::Add(args) => add_event(&config, cli.offline, args),
        Command::Recalc => {
            let store = open_store(&config.workbook_path)?;
            let mut resolver = resolver(&config, cli.offline)?;
            let events = store.load_events()?;
            let outcome = recompute_and_save(
                store.as_ref(),
                &events,
                None,
                &CoordinateCache::new(),
                &mut resolver,
            );
            report(&outcome)?;
            println!("Recalculation complete: {} groups", outcome.table.len());
            Ok(())
        }
        Command::Import {
            files,
            remove_imported: remove,
        } => import(&config, cli.offline, &files, remove),
        Command::Stats { format } => {
            let store = open_store(&config.workbook_path)?;
            let loaded = load(store.as_ref(), &mut resolver(&config, cli.offline)?)?;
            match format {
                Format::Table => print!("{}", stats_to_text(&loaded.stats)),
                Format::Csv => print!("{}", stats_to_csv(&loaded.stats)?),
                Format::Json => println!("{}", stats_to_json(&loaded.stats)?),
            }
            Ok(())
        }
        Command::Lookup { name } => {
            let place = lookup_place(&config, cli.offline, &name)?;
            let suggestion = lecture_map::place::suggest_address(&place)?;
            println!("{}", serde_json::to_string_pretty(&suggestion)?);
            Ok(())
        }
        Command::Views { action } => views(&config, cli.offline, action),
        Command::Markers { view } => {
            let catalog = ViewCatalog::load(&config.views_path)?;
            let view = catalog
                .get(&view)
                .ok_or_else(|| format!("No view named {}", view))?;
            let store = open_store(&config.workbook_path)?;
            let loaded = load(store.as_ref(), &mut resolver(&config, cli.offline)?)?;
            let markers = markers_for_view(view, &loaded.stats);
            println!("{}", serde_json::to_string_pretty(&markers)?);
            Ok(())
        }
        Command::Archive { clear } => {
            let store = open_store(&config.workbook_path)?;
            let target = if clear {
                lecture_map::archive::archive_and_clear(store.as_ref(), &config.archive_dir, Local::now())?
            } else {
                lecture_map::archive::archive_workbook(store.location(), &config.archive_dir, Local::now())?
            };
            println!("Archiving complete: {}", target.display());
            Ok(())
        }
    }
}

fn add_event(config: &Config, offline: bool, args: AddArgs) -> Result<(), Box<dyn Error>> {
    let form = EventForm {
        date: args.date.unwrap_or_else(today),
        institution_name: args.name,
        address: args.address,
        city: args.city,
        state: args.state,
        postal_code: args.postal_code,
        tables: args.tables,
        participants: args.participants,
    };
    let event = form.validate()?;

    let store = open_store(&config.workbook_path)?;
    let mut resolver = resolver(config, offline)?;
    let Loaded {
        mut events, stats, ..
    } = load(store.as_ref(), &mut resolver)?;

    let mut cache = CoordinateCache::from_table(&stats);
    let known = match (args.lat, args.lon) {
        (Some(latitude), Some(longitude)) => Some(Coordinate {
            latitude,
            longitude,
        }),
        _ => None,
    };
    // A rebuild visits the first event's group first, so the seed only
    // belongs to this event when the log was empty.
    let seed = match known {
        Some(coordinate) if events.is_empty() => Some(coordinate),
        Some(coordinate) => {
            if stats.get(&event.institution_name, &event.city).is_none() {
                cache.insert(&event.institution_name, &event.city, coordinate);
            }
            None
        }
        None => None,
    };

    events.push(event);
    let outcome = recompute_and_save(store.as_ref(), &events, seed, &cache, &mut resolver);
    report(&outcome)?;
    println!("Data saved successfully!");
    Ok(())
}

fn import(config: &Config, offline: bool, files: &[PathBuf], remove: bool) -> Result<(), Box<dyn Error>> {
    let result = import_files(files);
    for (file, reason) in &result.skipped_files {
        eprintln!("Skipped {}: {}", file.display(), reason);
    }
    for rejection in &result.rejected {
        eprintln!(
            "Not processed: {} line {}: {}",
            rejection.file.display(),
            rejection.line,
            rejection.reason
        );
    }
    if !result.is_clean() {
        eprintln!("Files with problems were kept; correct them and import them again.");
    }
    if result.accepted.is_empty() {
        println!("Nothing to import");
        return Ok(());
    }

    let store = open_store(&config.workbook_path)?;
    let mut resolver = resolver(config, offline)?;
    let Loaded {
        mut events, stats, ..
    } = load(store.as_ref(), &mut resolver)?;
    let cache = CoordinateCache::from_table(&stats);
    events.extend(result.accepted.iter().cloned());

    let outcome = recompute_and_save(store.as_ref(), &events, None, &cache, &mut resolver);
    report(&outcome)?;
    println!("Bulk import complete: {} events added", result.accepted.len());

    if remove {
        for file in remove_imported(&result)? {
            println!("Removed {}", file.display());
        }
    }
    Ok(())
}

fn views(config: &Config, offline: bool, action: ViewsCommand) -> Result<(), Box<dyn Error>> {
    let mut catalog = ViewCatalog::load(&config.views_path)?;
    match action {
        ViewsCommand::List => {
            for view in catalog.views() {
                println!(
                    "{}: center ({}, {}), ({}, {}) - ({}, {})",
                    view.name,
                    view.lat_0,
                    view.lon_0,
                    view.llcrnrlat,
                    view.llcrnrlon,
                    view.urcrnrlat,
                    view.urcrnrlon
                );
            }
        }
        ViewsCommand::Add {
            name,
            lat,
            lon,
            llc_lat,
            llc_lon,
            urc_lat,
            urc_lon,
        } => {
            let view = View {
                name,
                lat_0: lat,
                lon_0: lon,
                llcrnrlat: llc_lat,
                llcrnrlon: llc_lon,
                urcrnrlat: urc_lat,
                urcrnrlon: urc_lon,
            };
            let upsert = catalog.upsert(view)?;
            catalog.save()?;
            match upsert {
                Upsert::Added => println!("View saved successfully"),
                Upsert::Updated => println!("View updated successfully"),
            }
        }
        ViewsCommand::Remove { name } => {
            catalog.remove(&name)?;
            catalog.save()?;
            println!("View removed successfully");
        }
        ViewsCommand::Lookup { city, state, save } => {
            let place = lookup_place(config, offline, &format!("{}, {}", city, state))?;
            let view = View::from_place(&place)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            if save {
                catalog.upsert(view)?;
                catalog.save()?;
            }
        }
    }
    Ok(())
}

fn load(store: &dyn EventStore, resolver: &mut dyn GeoResolver) -> Result<Loaded, Box<dyn Error>> {
    let loaded = load_or_init(store, resolver)?;
    match loaded.notice {
        Some(LoadNotice::Created) => eprintln!(
            "{} not found, created new file",
            store.location().display()
        ),
        Some(LoadNotice::EventsMissing) => eprintln!("Events sheet not found, Stats reset"),
        Some(LoadNotice::StatsRebuilt) => {
            eprintln!("Stats sheet not found, created new from values in Events sheet")
        }
        None => {}
    }
    Ok(loaded)
}

fn report(outcome: &RecomputeOutcome) -> Result<(), Box<dyn Error>> {
    for warning in &outcome.warnings {
        eprintln!("Coordinates not found: {}", warning);
    }
    if !outcome.saved {
        return Err("Data not saved. Please check that the Excel file is not open and try again.".into());
    }
    Ok(())
}

fn resolver(config: &Config, offline: bool) -> Result<Box<dyn GeoResolver>, Box<dyn Error>> {
    if offline {
        return Ok(Box::new(Offline));
    }
    #[cfg(feature = "nominatim")]
    let resolver: Box<dyn GeoResolver> = {
        use lecture_map::{RateLimited, Retry, nominatim::Nominatim};
        let geocoder = &config.geocoder;
        let client = Nominatim::new(geocoder.clone())?;
        Box::new(Retry::new(
            RateLimited::new(client, geocoder.requests_per_second),
            geocoder.retries,
        ))
    };
    #[cfg(not(feature = "nominatim"))]
    let resolver: Box<dyn GeoResolver> = {
        let _ = config;
        log::warn!("built without the nominatim feature, coordinates will not be resolved");
        Box::new(Offline)
    };
    Ok(resolver)
}

#[cfg(feature = "nominatim")]
fn lookup_place(
    config: &Config,
    offline: bool,
    text: &str,
) -> Result<lecture_map::place::Place, Box<dyn Error>> {
    if offline {
        return Err("address lookup needs the geocoding service".into());
    }
    let client = lecture_map::nominatim::Nominatim::new(config.geocoder.clone())?;
    match client.lookup_place(text)? {
        Some(place) => Ok(place),
        None => Err(lecture_map::place::AddressError::NotFound(text.to_string()).into()),
    }
}

#[cfg(not(feature = "nominatim"))]
fn lookup_place(
    _config: &Config,
    _offline: bool,
    _text: &str,
) -> Result<lecture_map::place::Place, Box<dyn Error>> {
    Err("built without the nominatim feature".into())
}

fn today() -> String {
    Local::now().format("%d.%m.%Y").to_string()
}
