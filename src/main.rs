use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use toniesync::{
    DataDir, NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient,
    SharedProgressReporter, SourceLink, SpotifySession, SyncOptions, TonieHttpClient,
    find_creative_tonie, sync_source,
};

// Emoji with fallback for terminals without Unicode support
static BEAR: Emoji<'_, '_> = Emoji("🧸 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static MUSIC: Emoji<'_, '_> = Emoji("🎵 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static UPLOAD: Emoji<'_, '_> = Emoji("📤 ", "[^] ");
static TRASH: Emoji<'_, '_> = Emoji("🗑️  ", "[-] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[?] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Mirror a Spotify playlist or show onto a Creative Tonie
#[derive(Parser, Debug)]
#[command(name = "toniesync")]
#[command(about = "Mirror a Spotify playlist or show onto a Creative Tonie")]
#[command(version)]
struct Args {
    /// Spotify playlist or show link (URL or URI)
    source: String,

    /// Spotify account username
    #[arg(long)]
    spotify_username: String,

    /// Spotify account password
    #[arg(long)]
    spotify_password: String,

    /// Tonie cloud account username
    #[arg(long)]
    tonie_username: String,

    /// Tonie cloud account password
    #[arg(long)]
    tonie_password: String,

    /// Name of the Tonie household
    #[arg(long)]
    household: String,

    /// Name of the Creative Tonie to sync onto
    #[arg(long)]
    tonie: String,

    /// Data directory for credentials and the download cache
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// Pace downloads against track duration to avoid account bans
    #[arg(long)]
    ban_protection: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output.
///
/// The pipeline is strictly sequential, so a single download bar below the
/// main spinner is enough.
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    download_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            download_bar: Mutex::new(None),
        }
    }

    fn get_or_create_download_bar(&self, total_bytes: u64) -> ProgressBar {
        let mut slot = self.download_bar.lock().unwrap();

        if let Some(bar) = slot.as_ref() {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(total_bytes));
        bar.set_style(style);
        *slot = Some(bar.clone());
        bar
    }

    fn finish_download_bar(&self) {
        let mut slot = self.download_bar.lock().unwrap();
        if let Some(bar) = slot.take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingCatalog { source } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching catalog: {}", source.cyan()));
            }

            ProgressEvent::CatalogRetry {
                attempt,
                max_attempts,
                error,
            } => {
                self.main_bar.println(format!(
                    "{WARNING}Catalog request failed (attempt {attempt}/{max_attempts}): {}",
                    error.yellow()
                ));
            }

            ProgressEvent::CatalogFetched { total_items } => {
                self.main_bar.set_message(format!(
                    "{MUSIC}{} items in catalog",
                    total_items.to_string().cyan()
                ));
            }

            ProgressEvent::ItemStarting {
                item_index,
                total_items,
                title,
            } => {
                self.main_bar.set_message(format!(
                    "[{}/{}] {}",
                    (item_index + 1).to_string().cyan(),
                    total_items.to_string().cyan(),
                    truncate_title(&title, 40)
                ));
            }

            ProgressEvent::ItemCached { title } => {
                self.main_bar.println(format!(
                    "{SUCCESS}{} {}",
                    truncate_title(&title, 40).green(),
                    "(cached)".dimmed()
                ));
            }

            ProgressEvent::ItemUnavailable { title } => {
                self.main_bar.println(format!(
                    "{WARNING}{} {}",
                    truncate_title(&title, 40).yellow(),
                    "(not playable, skipped)".dimmed()
                ));
            }

            ProgressEvent::DownloadProgress {
                title,
                bytes_downloaded,
                total_bytes,
            } => {
                let bar = self.get_or_create_download_bar(total_bytes);
                bar.set_position(bytes_downloaded);
                bar.set_message(truncate_title(&title, 40));
            }

            ProgressEvent::DownloadCompleted {
                title,
                elapsed_secs,
            } => {
                self.finish_download_bar();
                self.main_bar.set_message(format!(
                    "{DOWNLOAD}{} downloaded in {elapsed_secs:.0}s",
                    truncate_title(&title, 40)
                ));
            }

            ProgressEvent::Transcoding { title } => {
                self.main_bar.set_message(format!(
                    "{MUSIC}Converting {}",
                    truncate_title(&title, 40)
                ));
            }

            ProgressEvent::ItemReady { title } => {
                self.main_bar
                    .println(format!("{SUCCESS}{}", truncate_title(&title, 40).green()));
            }

            ProgressEvent::ItemFailed { title, error } => {
                self.finish_download_bar();
                self.main_bar.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.main_bar.println(format!(
                    "{TRASH}Removed {} leftover partial file(s)",
                    count.to_string().yellow()
                ));
            }

            ProgressEvent::RemovingChapter { title } => {
                self.main_bar.println(format!(
                    "{TRASH}Removing chapter {}",
                    truncate_title(&title, 40).yellow()
                ));
            }

            ProgressEvent::UploadingChapter { title } => {
                self.main_bar.set_message(format!(
                    "{UPLOAD}Uploading {}",
                    truncate_title(&title, 40)
                ));
            }

            ProgressEvent::ChapterUploaded {
                title,
                seconds_remaining,
            } => {
                self.main_bar.println(format!(
                    "{UPLOAD}{} uploaded, {} min left on tonie",
                    truncate_title(&title, 40).green(),
                    format!("{:.0}", seconds_remaining / 60.0).cyan()
                ));
            }

            ProgressEvent::ChapterSkippedNoSpace {
                title,
                needed_secs,
                free_secs,
            } => {
                self.main_bar.println(format!(
                    "{WARNING}{} skipped, needs {needed_secs:.0}s but only {free_secs:.0}s free",
                    truncate_title(&title, 40).yellow()
                ));
            }

            ProgressEvent::ChapterPresent { title } => {
                self.main_bar.println(format!(
                    "{SUCCESS}{} {}",
                    truncate_title(&title, 40).green(),
                    "(already on tonie)".dimmed()
                ));
            }

            ProgressEvent::ChaptersReordered { moves } => {
                self.main_bar.println(format!(
                    "{MUSIC}Reordered chapters ({} move(s))",
                    moves.to_string().cyan()
                ));
            }

            ProgressEvent::SyncCompleted {
                downloaded_count,
                cached_count,
                failed_count,
                uploaded_count,
                removed_count,
                skipped_capacity_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} cached, {} failed",
                    "Sync complete:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    cached_count.to_string().cyan(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
                println!(
                    "   {} {} uploaded, {} removed, {} skipped for space",
                    "Tonie:".bold(),
                    uploaded_count.to_string().green(),
                    removed_count.to_string().yellow(),
                    if skipped_capacity_count > 0 {
                        skipped_capacity_count.to_string().red()
                    } else {
                        skipped_capacity_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            BEAR,
            "toniesync".bold().magenta(),
            "- Spotify to Creative Tonie".dimmed()
        );
    }

    let link = SourceLink::parse(&args.source)?;

    let data_dir = DataDir::resolve(args.data_path.clone())?;
    data_dir.ensure()?;

    let tonie_client = TonieHttpClient::login(&args.tonie_username, &args.tonie_password)
        .await
        .context("Failed to log into the Tonie cloud")?;

    // Resolve the target tonie before touching Spotify so typos fail fast
    let tonie = find_creative_tonie(&tonie_client, &args.household, &args.tonie)
        .await
        .context("Failed to find the Creative Tonie")?;

    let session = SpotifySession::connect(
        &args.spotify_username,
        &args.spotify_password,
        data_dir.root(),
    )
    .await
    .context("Failed to log into Spotify")?;

    let client = ReqwestClient::new();

    let options = SyncOptions {
        ban_protection: args.ban_protection,
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let report = sync_source(
        &client,
        &session,
        &tonie_client,
        &tonie,
        &link,
        &data_dir,
        &options,
        reporter,
    )
    .await
    .context("Failed to sync")?;

    if !args.quiet && !report.failed_items.is_empty() {
        println!("\n{}", "Failed items:".red().bold());
        for (title, error) in &report.failed_items {
            println!("  {}{} - {}", CROSS, title.yellow(), error.dimmed());
        }
    }

    if report.failed > 0 && report.downloaded == 0 && report.cached == 0 {
        std::process::exit(1);
    }

    Ok(())
}
