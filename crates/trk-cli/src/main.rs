//! CLI interface for trk - a private torrent tracker from the terminal.

use std::env;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use dialoguer::{Input, Password};
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug};
use trk_core::paths::write_default_config;
use trk_core::tracker::{DetailSections, UploadRequest, ops, render_message};
use trk_core::{
    APP_NAME, AppConfig, AppPaths, Connection, Credentials, HttpTracker, LogLevel, Poller,
    SessionStore, Shoutbox, generate_example_config, generate_schema,
};

const REPO_URL: &str = "https://github.com/byteowlz/trk";

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Init(cmd) => handle_init(&ctx, &cmd),
        Command::Search {
            query,
            category,
            dead,
        } => rt.block_on(handle_search(&ctx, &query.join(" "), &category, dead)),
        Command::Details { id, section } => rt.block_on(handle_details(&ctx, id, &section)),
        Command::Download { id, dest } => rt.block_on(handle_download(&ctx, id, &dest)),
        Command::Upload(cmd) => rt.block_on(handle_upload(&ctx, cmd)),
        Command::Thank { id } => rt.block_on(handle_thank(&ctx, id)),
        Command::Comment { id, message } => {
            rt.block_on(handle_comment(&ctx, id, &message.join(" ")))
        }
        Command::Shout { subcommand } => rt.block_on(handle_shout(&ctx, subcommand)),
        Command::Config { subcommand } => handle_config(&ctx, subcommand),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "trk",
    author,
    version,
    about = "Private torrent tracker from the terminal",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

/// Common CLI options shared across all subcommands.
#[derive(Debug, Clone, Args)]
pub struct CommonOpts {
    /// Override the config file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    /// Reduce output to only errors.
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    pub quiet: bool,
    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Enable trace logging.
    #[arg(long, global = true)]
    pub trace: bool,
    /// Output machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Disable ANSI colors in output.
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    pub no_color: bool,
    /// Control color output.
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    pub color: ColorOption,
    /// Do not change anything on disk.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
    /// Assume "yes" for interactive prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
    /// Detect terminal capabilities automatically.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store tracker credentials and write the default config.
    Init(InitCommand),
    /// Search torrents by name.
    Search {
        /// Search terms.
        #[arg(required = true)]
        query: Vec<String>,
        /// Restrict to numeric category ids (repeatable).
        #[arg(short, long)]
        category: Vec<i64>,
        /// Include dead torrents (no seeders).
        #[arg(short, long)]
        dead: bool,
    },
    /// Show one torrent record.
    Details {
        /// Torrent id.
        id: i64,
        /// Sections to fetch: info, files, peers, snatch, or all.
        #[arg(short, long, default_value = "info")]
        section: String,
    },
    /// Download a torrent metadata file.
    Download {
        /// Torrent id.
        id: i64,
        /// Target file or directory; empty means the server name in the
        /// current directory.
        #[arg(default_value = "")]
        dest: String,
    },
    /// Upload a new torrent.
    Upload(UploadCommand),
    /// Thank the uploader of a torrent.
    Thank {
        /// Torrent id.
        id: i64,
    },
    /// Post a comment on a torrent.
    Comment {
        /// Torrent id.
        id: i64,
        /// Comment text.
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Shoutbox chat (read, write, live poll).
    Shout {
        #[command(subcommand)]
        subcommand: ShoutCommand,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        subcommand: ConfigCommand,
    },
    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct InitCommand {
    /// Overwrite existing config and credentials.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
struct UploadCommand {
    /// Torrent metadata file.
    torrent: PathBuf,
    /// Nfo file.
    nfo: PathBuf,
    /// Description text file.
    description: PathBuf,
    /// First screenshot or cover image.
    image1: PathBuf,
    /// Optional second image.
    image2: Option<PathBuf>,
    /// Numeric category id.
    #[arg(short, long)]
    category: i64,
    /// Display name; defaults to the torrent file stem.
    #[arg(short, long)]
    name: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ShoutCommand {
    /// Print the available backlog once.
    Read {
        /// Which shoutbox: user or team.
        #[arg(default_value_t = Shoutbox::User)]
        shoutbox: Shoutbox,
    },
    /// Post a message.
    Write {
        /// Message text.
        #[arg(required = true)]
        message: Vec<String>,
        /// Which shoutbox: user or team.
        #[arg(short, long, default_value_t = Shoutbox::User)]
        shoutbox: Shoutbox,
    },
    /// Follow the shoutbox live until interrupted.
    Poll {
        /// Which shoutbox: user or team.
        #[arg(default_value_t = Shoutbox::User)]
        shoutbox: Shoutbox,
        /// Refresh interval in seconds (default from config).
        #[arg(short, long)]
        refresh: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Print the config file path.
    Path,
    /// Print all resolved directories.
    Paths,
    /// Print the JSON schema for the config file.
    Schema,
    /// Print a fully commented example config.
    Example,
    /// Reset the config file to defaults.
    Reset,
}

struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = AppConfig::load(&paths, common.dry_run)?;
        let paths = paths.apply_overrides(&config)?;
        let ctx = Self {
            common,
            paths,
            config,
        };
        ctx.ensure_directories()?;
        Ok(ctx)
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

        let force_color = matches!(self.common.color, ColorOption::Always)
            || env::var_os("FORCE_COLOR").is_some();
        let disable_color = self.common.no_color
            || matches!(self.common.color, ColorOption::Never)
            || env::var_os("NO_COLOR").is_some()
            || (!force_color && !io::stderr().is_terminal());

        if disable_color {
            builder.write_style(WriteStyle::Never);
        } else if force_color {
            builder.write_style(WriteStyle::Always);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => match self.config.logging.level {
                    LogLevel::Error => LevelFilter::Error,
                    LogLevel::Warn => LevelFilter::Warn,
                    LogLevel::Info => LevelFilter::Info,
                    LogLevel::Debug => LevelFilter::Debug,
                    LogLevel::Trace => LevelFilter::Trace,
                },
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn ensure_directories(&self) -> Result<()> {
        if self.common.dry_run {
            self.paths.log_dry_run();
            return Ok(());
        }
        self.paths.ensure_directories()
    }

    fn store(&self) -> SessionStore {
        SessionStore::new(self.paths.state_dir.clone())
    }

    /// Base URL for requests: the one credentials were stored for, falling
    /// back to the configured default before `trk init` has run.
    fn base_url(&self) -> String {
        self.store()
            .load_credentials()
            .map_or_else(|_| self.config.tracker.base_url.clone(), |c| c.base_url)
    }

    fn connect(&self) -> Result<Connection<HttpTracker>> {
        let timeout = Duration::from_secs(self.config.runtime.timeout.max(1));
        let api = HttpTracker::new(&self.base_url(), timeout)?;
        Ok(Connection::new(api, self.store()))
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

fn handle_init(ctx: &RuntimeContext, cmd: &InitCommand) -> Result<()> {
    if !ctx.paths.config_file.exists() || cmd.force {
        if ctx.common.dry_run {
            log::info!(
                "dry-run: would write default config to {}",
                ctx.paths.config_file.display()
            );
        } else {
            write_default_config(&ctx.paths.config_file)?;
            println!("wrote config to {}", ctx.paths.config_file.display());
        }
    }

    let store = ctx.store();
    if store.load_credentials().is_ok() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "credentials already stored in {} (use --force to replace)",
            ctx.paths.state_dir.display()
        ));
    }

    let base_url: String = Input::new()
        .with_prompt("Tracker URL")
        .default(ctx.config.tracker.base_url.clone())
        .interact_text()?;
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password = Password::new().with_prompt("Password").interact()?;
    let pin: String = Input::new()
        .with_prompt("PIN")
        .allow_empty(true)
        .interact_text()?;

    if ctx.common.dry_run {
        log::info!("dry-run: would store credentials for {username}");
        return Ok(());
    }
    store.save_credentials(&Credentials {
        username,
        password,
        pin,
        base_url,
    })?;
    println!("credentials stored in {}", ctx.paths.state_dir.display());
    println!("note: a fresh login happens on the next command that needs one");
    Ok(())
}

async fn handle_search(
    ctx: &RuntimeContext,
    query: &str,
    categories: &[i64],
    dead: bool,
) -> Result<()> {
    let conn = ctx.connect()?;
    let results = ops::search(&conn, query, categories, dead).await?;
    conn.persist()?;

    if ctx.common.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("no torrents matching '{query}'");
        return Ok(());
    }
    println!(
        "{:>8}  {:>10}  {:>5}  {:>5}  {:19}  name",
        "id", "size", "seed", "leech", "added"
    );
    for t in &results {
        println!(
            "{:>8}  {:>10}  {:>5}  {:>5}  {:19}  {}",
            t.id,
            format_size(t.size),
            t.seeders,
            t.leechers,
            format_date(t.added),
            t.name
        );
    }
    Ok(())
}

async fn handle_details(ctx: &RuntimeContext, id: i64, section: &str) -> Result<()> {
    let sections = DetailSections::select(section);
    let conn = ctx.connect()?;
    let details = ops::details(&conn, id, sections).await?;
    conn.persist()?;

    if ctx.common.json {
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    if sections.info {
        println!("{}", details.name);
        println!("  id:        {}", details.id);
        println!("  info hash: {}", details.info_hash);
        println!("  category:  {}", details.category);
        println!(
            "  size:      {} in {} files",
            format_size(details.size),
            details.file_count
        );
        println!("  added:     {}", format_date(details.added));
        println!(
            "  peers:     {} seeders, {} leechers, {} snatches",
            details.seeders, details.leechers, details.snatches
        );
        if !details.description.is_empty() {
            println!("\n{}", details.description);
        }
    }
    if sections.files && !details.files.is_empty() {
        println!("\nfiles:");
        for f in &details.files {
            println!("  {:>10}  {}", format_size(f.size), f.name);
        }
    }
    if sections.peers && !details.peers.is_empty() {
        println!("\npeers:");
        for p in &details.peers {
            let role = if p.seeder { "seed" } else { "leech" };
            println!(
                "  {:>5}  {:>10} up  {:>10} down  ratio {:.2}  {:>5.1}%  {}  ({})",
                role,
                format_size(p.uploaded),
                format_size(p.downloaded),
                p.ratio,
                p.completed,
                p.name,
                p.client
            );
        }
    }
    if sections.snatches && !details.snatch_list.is_empty() {
        println!("\nsnatches:");
        for s in &details.snatch_list {
            let state = if s.seeding {
                "seeding".to_string()
            } else {
                s.stopped
                    .map_or_else(|| "stopped".to_string(), |t| format!("stopped {}", format_date(t)))
            };
            println!(
                "  {:>10} up  {:>10} down  ratio {:.2}  {}  ({state})",
                format_size(s.uploaded),
                format_size(s.downloaded),
                s.ratio,
                s.name
            );
        }
    }
    Ok(())
}

async fn handle_download(ctx: &RuntimeContext, id: i64, dest: &str) -> Result<()> {
    let conn = ctx.connect()?;
    let (path, size) = ops::download(&conn, id, dest).await?;
    conn.persist()?;
    println!(
        "downloaded {} ({})",
        path.display(),
        format_size(size as u64)
    );
    Ok(())
}

async fn handle_upload(ctx: &RuntimeContext, cmd: UploadCommand) -> Result<()> {
    let name = match cmd.name {
        Some(name) => name,
        None => cmd
            .torrent
            .file_stem()
            .and_then(|s| s.to_str())
            .map(String::from)
            .ok_or_else(|| anyhow!("cannot derive a name from {}", cmd.torrent.display()))?,
    };
    let request = UploadRequest {
        torrent: cmd.torrent,
        nfo: cmd.nfo,
        image1: cmd.image1,
        image2: cmd.image2,
        description: cmd.description,
        name,
        category: cmd.category,
    };

    let conn = ctx.connect()?;
    let id = ops::upload(&conn, &request).await?;
    conn.persist()?;
    println!("Upload successful: {}/details.php?id={id}", ctx.base_url());
    Ok(())
}

async fn handle_thank(ctx: &RuntimeContext, id: i64) -> Result<()> {
    let conn = ctx.connect()?;
    ops::thank(&conn, id).await?;
    conn.persist()?;
    println!("thanked the uploader of torrent {id}");
    Ok(())
}

async fn handle_comment(ctx: &RuntimeContext, id: i64, text: &str) -> Result<()> {
    let conn = ctx.connect()?;
    ops::comment(&conn, id, text).await?;
    conn.persist()?;
    println!("comment posted on torrent {id}");
    Ok(())
}

async fn handle_shout(ctx: &RuntimeContext, cmd: ShoutCommand) -> Result<()> {
    let conn = ctx.connect()?;
    match cmd {
        ShoutCommand::Read { shoutbox } => {
            let messages = ops::shout_read(&conn, shoutbox).await?;
            if ctx.common.json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                for message in messages.iter().filter(|m| !m.is_control()) {
                    println!("{}", render_message(message));
                }
            }
        }
        ShoutCommand::Write { message, shoutbox } => {
            ops::shout_write(&conn, shoutbox, &message.join(" ")).await?;
            println!("shout posted to the {shoutbox} shoutbox");
        }
        ShoutCommand::Poll { shoutbox, refresh } => {
            let secs = refresh.unwrap_or(ctx.config.runtime.refresh).max(1);
            let (tx, rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("installing ctrl-c handler: {e}");
                }
                let _ = tx.send(true);
            });
            Poller::new(&conn, shoutbox, Duration::from_secs(secs))
                .run(rx)
                .await?;
        }
    }
    conn.persist()?;
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ctx.config)
                        .context("serializing config to JSON")?
                );
            } else {
                println!("{:#?}", ctx.config);
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Paths => {
            if ctx.common.json {
                let paths = serde_json::json!({
                    "config": ctx.paths.config_file,
                    "data": ctx.paths.data_dir,
                    "state": ctx.paths.state_dir,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&paths).context("serializing paths to JSON")?
                );
            } else {
                println!("config: {}", ctx.paths.config_file.display());
                println!("data:   {}", ctx.paths.data_dir.display());
                println!("state:  {}", ctx.paths.state_dir.display());
            }
            Ok(())
        }
        ConfigCommand::Schema => {
            println!("{}", generate_schema(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Example => {
            println!("{}", generate_example_config(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

// ─── Formatting helpers ──────────────────────────────────────────────

/// Human-readable byte size with binary units.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Timestamp in the tracker's customary `dd.mm.yyyy HH:MM:SS` form.
fn format_date(time: chrono::DateTime<chrono::Utc>) -> String {
    time.format("%d.%m.%Y %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KiB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GiB");
    }

    #[test]
    fn dates_use_day_first_format() {
        let time = chrono::Utc
            .with_ymd_and_hms(2024, 3, 9, 17, 5, 0)
            .single()
            .expect("valid time");
        assert_eq!(format_date(time), "09.03.2024 17:05:00");
    }

    #[test]
    fn cli_parses() {
        Cli::command().debug_assert();
    }
}
