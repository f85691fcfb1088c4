mod config;
mod directory;
mod error;
mod merge;
mod models;
mod output;
mod portal;
mod prompt;
mod roster;
mod utils;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::directory::{FacultyDirectory, GradDirectory};
use crate::models::CourseSet;
use crate::portal::CourseCrawler;
use crate::prompt::ConsolePrompter;

#[derive(Parser)]
#[command(name = "egrades-rosters", about = "Course roster extraction and merge", version)]
struct Cli {
    /// TA assignment spreadsheet (CSV: course suffix, instructor, TA names...)
    ta_csv_file: PathBuf,

    /// Load course rosters from DIR instead of crawling the portal
    #[arg(short, long, value_name = "DIR", conflicts_with_all = ["save", "quarter"])]
    load: Option<PathBuf>,

    /// Save each downloaded roster file to DIR
    #[arg(short, long, value_name = "DIR")]
    save: Option<PathBuf>,

    /// Quarter to fetch as YYYYQ (Q: 1 Winter, 2 Spring, 3 Summer, 4 Fall).
    /// Defaults to the portal's current quarter.
    #[arg(short, long)]
    quarter: Option<String>,

    /// Log each portal request and its form body (credentials stay hidden)
    #[arg(short, long)]
    debug: bool,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose >= 2 {
        "trace"
    } else if cli.verbose == 1 || cli.debug {
        "egrades_rosters=debug,info"
    } else {
        "egrades_rosters=info,warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    ensure!(
        cli.ta_csv_file
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv")),
        "TA_CSV_FILE must be a .csv file: {:?}",
        cli.ta_csv_file
    );

    let config = AppConfig::load()?;
    let mut prompter = ConsolePrompter;
    let _t = utils::Timer::start("Course roster merge");

    let faculty = FacultyDirectory::fetch(
        &config.directory.faculty_url,
        &config.directory.email_domain,
    )
    .context("Failed to fetch the faculty schedule page")?;
    let grads = GradDirectory::fetch(&config.directory.grad_url)
        .context("Failed to build the graduate-student directory")?;

    // Fetch the student-to-course mapping from the portal, or rebuild it
    // from rosters a previous run saved.
    let (mut courses, quarter) = if let Some(dir) = &cli.load {
        roster::load_saved(dir, &mut prompter)
            .with_context(|| format!("Failed to load rosters from {:?}", dir))?
    } else {
        let mut crawler = CourseCrawler::new(&config.portal, cli.debug)
            .context("Failed to reach the portal")?;
        crawler.login(&mut prompter)?;

        let listings = crawler.list_courses(cli.quarter.as_deref(), &faculty, &mut prompter)?;
        info!("{} course sections with enrolled students", listings.len());

        let mut courses = CourseSet::new();
        for listing in &listings {
            let students = crawler
                .fetch_roster(listing, cli.save.as_deref(), &mut prompter)
                .with_context(|| format!("Failed to download roster for {}", listing.course))?;
            merge::insert_course(
                &mut courses,
                &listing.course,
                listing.instructor.clone(),
                students,
            );
        }
        (courses, crawler.active_quarter().map(String::from))
    };
    if let Some(quarter) = &quarter {
        info!("Active quarter: {}", quarter);
    }

    let ta_file = File::open(&cli.ta_csv_file)
        .with_context(|| format!("{:?} does not exist", cli.ta_csv_file))?;
    merge::merge_tas(ta_file, &mut courses, &grads, &mut prompter)?;

    output::write_output(&config.output.json_path, &courses)
}
