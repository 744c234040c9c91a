use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use jazzplay::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in to Spotify
    Login,

    /// Forget the Spotify session
    Logout,

    /// Show session, account and market
    Status,

    /// Show or change the market used for search and playback
    Market(MarketOptions),

    /// Search tracks of a standard
    Search(SearchOptions),

    /// Play a track on your Spotify device
    Play(PlayOptions),

    /// Pause playback
    Pause,

    /// Jump to a position in the current track
    Seek(SeekOptions),

    /// Set the playback volume
    Volume(VolumeOptions),

    /// Run the token proxy and callback server
    Serve,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct MarketOptions {
    /// Two-letter country code
    #[clap(conflicts_with = "from_profile")]
    pub code: Option<String>,

    /// Use the country of your Spotify profile
    #[clap(long)]
    pub from_profile: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// Title of the standard
    pub title: String,

    /// Narrow the search to a composer or performer
    #[clap(long)]
    pub composer: Option<String>,

    /// Number of results (1-50)
    #[clap(long, default_value_t = 10)]
    pub limit: u32,
}

#[derive(Parser, Debug, Clone)]
#[command(group = clap::ArgGroup::new("source").required(true).args(["track", "search"]))]
pub struct PlayOptions {
    /// Track id, spotify:track URI or open.spotify.com link
    pub track: Option<String>,

    /// Play the best match for a search instead
    #[clap(long)]
    pub search: Option<String>,

    /// Follow playback progress until the track ends
    #[clap(long)]
    pub follow: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SeekOptions {
    /// Position as M:SS or milliseconds
    pub position: String,
}

#[derive(Parser, Debug, Clone)]
pub struct VolumeOptions {
    /// Volume in percent
    #[clap(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub percent: u8,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }
    init_tracing();

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command_for_update();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let api = match cli::web_api() {
        Ok(api) => api,
        Err(e) => error!("Cannot open session storage. Err: {}", e),
    };

    match cli.command {
        Command::Login => cli::login(api).await,
        Command::Logout => cli::logout(api).await,
        Command::Status => cli::status(api).await,
        Command::Market(opt) => cli::market(api, opt.code, opt.from_profile).await,
        Command::Search(opt) => cli::search(api, opt.title, opt.composer, opt.limit).await,
        Command::Play(opt) => cli::play(api, opt.track, opt.search, opt.follow).await,
        Command::Pause => cli::pause(api).await,
        Command::Seek(opt) => cli::seek(api, opt.position).await,
        Command::Volume(opt) => cli::volume(api, opt.percent).await,
        Command::Serve => cli::serve(api).await,
        Command::Completions(_) => {}
    }
}
