use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::signal::unix::{SignalKind, signal};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use boostysync::api::BOOSTY_API_URL;
use boostysync::notify::{
    DEFAULT_JELLYFIN_URL, DEFAULT_PLEX_URL, DEFAULT_SENDMAIL, DEFAULT_TIMEOUT_SECS,
    JellyfinConfig, PlexConfig,
};
use boostysync::{
    ApiClient, EmailNotifier, InstanceLock, JellyfinNotifier, LoftyEmbedder, NoopReporter,
    Notifier, PlexNotifier, ProgressEvent, ProgressReporter, Quality, ReqwestClient,
    SharedProgressReporter, SyncOptions, Syncer, collect_listing, ensure_output_dir,
    find_default_cookies_file, load_access, notify_all, sync_links,
};

// Emoji with fallback for terminals without Unicode support
static CLAPPER: Emoji<'_, '_> = Emoji("🎬 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static CHANNEL: Emoji<'_, '_> = Emoji("📺 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[-] ");
static TAG: Emoji<'_, '_> = Emoji("🏷️  ", "[t] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Download videos from Boosty channels into a media library
#[derive(Parser, Debug)]
#[command(name = "boostysync")]
#[command(about = "Download videos from Boosty channels into a media library")]
#[command(version)]
struct Args {
    /// Channel names, channel URLs or post URLs
    #[arg(env = "CHANNELS", value_delimiter = ' ', required = true)]
    channels: Vec<String>,

    /// Netscape cookie file with a Boosty session (for paid content)
    #[arg(short, long, env = "COOKIES_FILE")]
    cookies: Option<PathBuf>,

    /// Refresh the access token even if it is not about to expire
    #[arg(long)]
    force_access_token_refresh: bool,

    /// Library root; must already exist
    #[arg(short, long, env = "TARGET_PATH", default_value = ".")]
    output: PathBuf,

    /// Best quality to download (tiny, lowest, low, medium, high, full_hd, quad_hd, ultra_hd)
    #[arg(short = 'q', long)]
    max_quality: Option<Quality>,

    /// Only process posts from the last N days
    #[arg(long)]
    days_back: Option<u32>,

    /// Refresh tags of existing files instead of downloading
    #[arg(long)]
    update_metadata: bool,

    /// Don't group videos into `Season <year>` directories
    #[arg(long)]
    no_season_dir: bool,

    /// Don't group videos into per-channel directories
    #[arg(long)]
    no_channel_dir: bool,

    /// Refuse to run while another instance holds this lock file
    #[arg(long)]
    lock_file: Option<PathBuf>,

    /// Print the posts as JSON instead of downloading
    #[arg(long)]
    list: bool,

    /// Plex library section (name or key) to refresh after downloads
    #[arg(long)]
    plex_section: Option<String>,

    #[arg(long, default_value = DEFAULT_PLEX_URL)]
    plex_url: String,

    #[arg(long, env = "PLEX_TOKEN", hide_env_values = true)]
    plex_token: Option<String>,

    /// Plex request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    plex_timeout: u64,

    /// Jellyfin library (name or id) to refresh after downloads
    #[arg(long)]
    jellyfin_item: Option<String>,

    #[arg(long, default_value = DEFAULT_JELLYFIN_URL)]
    jellyfin_url: String,

    #[arg(long, env = "JELLYFIN_TOKEN", hide_env_values = true)]
    jellyfin_token: Option<String>,

    /// Jellyfin request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    jellyfin_timeout: u64,

    /// Mail the list of downloaded files to this address
    #[arg(long, env = "NOTIFY_EMAIL")]
    email_to: Option<String>,

    /// sendmail-compatible binary used for email notifications
    #[arg(long, env = "SENDMAIL_BIN", default_value = DEFAULT_SENDMAIL)]
    sendmail: PathBuf,

    /// Log decisions and paging details
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - suppress progress output
    #[arg(long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    download_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::with_template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            download_bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, length: Option<u64>, position: u64, filename: &str) {
        let style = ProgressStyle::with_template(&format!(
            "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(length.unwrap_or(0)));
        bar.set_style(style);
        bar.set_position(position);
        bar.set_message(truncate_title(filename, 50));

        if let Ok(mut slot) = self.download_bar.lock()
            && let Some(previous) = slot.replace(bar)
        {
            previous.finish_and_clear();
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(slot) = self.download_bar.lock()
            && let Some(bar) = slot.as_ref()
        {
            f(bar);
        }
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.download_bar.lock().ok().and_then(|mut slot| slot.take())
    }

    fn line(&self, message: String) {
        if self.multi.println(message).is_err() {
            warn!("unable to write progress line");
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingPosts { channel, days_back } => {
                let window = days_back
                    .map(|days| format!(" (last {days} days)"))
                    .unwrap_or_default();
                self.main_bar.set_message(format!(
                    "{SEARCH}Fetching posts: {}{}",
                    channel.cyan(),
                    window.dimmed()
                ));
            }

            ProgressEvent::FetchingPost { channel, post_id } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}Fetching post {} from {}",
                    post_id.cyan(),
                    channel.cyan()
                ));
            }

            ProgressEvent::PostsListed { channel, count } => {
                self.main_bar.set_message(format!(
                    "{CHANNEL}{} • {} posts",
                    channel.bold().green(),
                    count.to_string().cyan()
                ));
            }

            ProgressEvent::Skipped { name, reason } => {
                self.line(format!(
                    "  {SKIP}{} {}",
                    truncate_title(&name, 60).dimmed(),
                    format!("({reason})").yellow()
                ));
            }

            ProgressEvent::AlreadyExists { filename } => {
                self.main_bar
                    .set_message(format!("{SUCCESS}{}", truncate_title(&filename, 60).dimmed()));
            }

            ProgressEvent::UpdatingMetadata { filename } => {
                self.line(format!("  {TAG}{}", truncate_title(&filename, 60)));
            }

            ProgressEvent::DownloadStarting {
                filename,
                resume_from,
                content_length,
            } => {
                self.start_bar(content_length, resume_from, &filename);
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                self.with_bar(|bar| {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                });
            }

            ProgressEvent::DownloadCompleted { filename, .. } => {
                if let Some(bar) = self.take_bar() {
                    bar.finish_and_clear();
                }
                self.line(format!(
                    "  {SUCCESS}{}",
                    truncate_title(&filename, 60).green()
                ));
            }

            ProgressEvent::PartialRecovered { filename } => {
                self.line(format!(
                    "  {SUCCESS}{} {}",
                    truncate_title(&filename, 60).green(),
                    "(completed earlier)".dimmed()
                ));
            }

            ProgressEvent::DownloadFailed { filename, error } => {
                if let Some(bar) = self.take_bar() {
                    bar.finish_and_clear();
                }
                self.line(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&filename, 40).red(),
                    error.red()
                ));
            }

            ProgressEvent::SyncCompleted { stats } => {
                self.main_bar.finish_and_clear();
                let skipped =
                    stats.skipped_no_access + stats.skipped_no_videos + stats.skipped_no_media;
                println!(
                    "\n{PARTY}{} {} downloaded, {} existing, {} skipped, {} failed",
                    "Sync complete:".bold().green(),
                    stats.downloaded.to_string().green().bold(),
                    stats.existing.to_string().cyan(),
                    skipped.to_string().yellow(),
                    if stats.failed > 0 {
                        stats.failed.to_string().red().bold()
                    } else {
                        stats.failed.to_string().green()
                    }
                );
                if stats.metadata_updated > 0 {
                    println!(
                        "{TAG}{} files retagged",
                        stats.metadata_updated.to_string().cyan()
                    );
                }
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "boostysync=debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Media servers and mail recipients to tell about new files
fn build_notifiers(args: &Args, client: &ReqwestClient) -> Vec<Box<dyn Notifier>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    match (&args.plex_section, &args.plex_token) {
        (Some(section), Some(token)) => notifiers.push(Box::new(PlexNotifier::new(
            client.clone(),
            PlexConfig {
                url: args.plex_url.clone(),
                token: token.clone(),
                section: section.clone(),
                timeout: Duration::from_secs(args.plex_timeout),
            },
        ))),
        (Some(_), None) => warn!("--plex-section given without a Plex token, skipping Plex"),
        _ => {}
    }

    match (&args.jellyfin_item, &args.jellyfin_token) {
        (Some(item), Some(token)) => notifiers.push(Box::new(JellyfinNotifier::new(
            client.clone(),
            JellyfinConfig {
                url: args.jellyfin_url.clone(),
                token: token.clone(),
                item: item.clone(),
                timeout: Duration::from_secs(args.jellyfin_timeout),
            },
        ))),
        (Some(_), None) => {
            warn!("--jellyfin-item given without a Jellyfin token, skipping Jellyfin")
        }
        _ => {}
    }

    if let Some(to) = &args.email_to {
        notifiers.push(Box::new(EmailNotifier::new(&args.sendmail, to)));
    }

    notifiers
}

async fn run(args: Args) -> Result<()> {
    let _lock = args
        .lock_file
        .as_deref()
        .map(InstanceLock::acquire)
        .transpose()
        .context("Failed to acquire lock")?;

    ensure_output_dir(&args.output)?;

    let client = ReqwestClient::new();
    let now = Utc::now();

    let cookies = args.cookies.clone().or_else(find_default_cookies_file);
    let auth = match &cookies {
        Some(path) => {
            match load_access(
                &client,
                BOOSTY_API_URL,
                path,
                args.force_access_token_refresh,
                now,
            )
            .await
            {
                Ok(Some(auth)) => Some(auth),
                Ok(None) => {
                    warn!("no valid access token, only free content available");
                    None
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        reason = %e,
                        "unable to use cookie file, only free content available"
                    );
                    None
                }
            }
        }
        None => None,
    };

    let mut api = ApiClient::new(&client).with_auth(auth);

    if args.list {
        let listing = collect_listing(&mut api, &args.channels, args.days_back, now)
            .await
            .context("Failed to list posts")?;
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            CLAPPER,
            "boostysync".bold().magenta(),
            "- Boosty Video Downloader".dimmed()
        );
    }

    let options = SyncOptions {
        output_dir: args.output.clone(),
        max_quality: args.max_quality,
        days_back: args.days_back,
        use_season_dir: !args.no_season_dir,
        use_channel_dir: !args.no_channel_dir,
        update_metadata: args.update_metadata,
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let embedder = LoftyEmbedder::new();
    let mut syncer = Syncer::new(&client, &embedder, &options, reporter);

    let downloaded = sync_links(&mut api, &mut syncer, &args.channels, now)
        .await
        .context("Failed to sync channels")?;
    let result = syncer.finish();

    if !args.quiet && !result.failed_items.is_empty() {
        println!("\n{}", "Failed downloads:".red().bold());
        for (filename, error) in &result.failed_items {
            println!("  {}{} - {}", CROSS, filename.yellow(), error.dimmed());
        }
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Output: {}\n",
            args.output.display().to_string().cyan()
        );
    }

    let notifiers = build_notifiers(&args, &client);
    notify_all(&notifiers, &downloaded).await;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(reason = %e, "unable to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(reason = %e, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    // The run future (and the lock it holds) is dropped before we exit
    let outcome = tokio::select! {
        result = run(args) => Some(result),
        () = shutdown_signal() => None,
    };

    match outcome {
        Some(Ok(())) => ExitCode::SUCCESS,
        Some(Err(e)) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            ExitCode::FAILURE
        }
        None => {
            eprintln!("\n{}", "Interrupted".yellow());
            ExitCode::from(130)
        }
    }
}
