// src/cli.rs
use crate::api::{
    ApiError, CreatePodcastRequest, HttpPodcastApi, ListQuery, PodcastApi, PodcastStatus,
    RequestContext, TechnicalLevel,
};
use crate::config::{self, AppConfig, ConfigError, Settings};
use crate::detail::{chapter_source, DetailUpdate, PodcastDetail};
use crate::player::{
    format_time, AudioPlaybackController, ChapterTimetable, HeadlessBackend, PlaybackRate,
    PlayerError, PlayerNotification, PlayerStatus,
};
use crate::tracker::{poll_once, GenerationStatusTracker, StatusPoller, TrackerSnapshot};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "fionntan", about = "Paper-to-podcast client", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store the access token used for API calls
    Login {
        #[arg(long)]
        token: String,
    },
    /// Forget the stored access token
    Logout,
    /// Show the effective configuration
    Config,
    /// Request a new podcast
    Create {
        #[arg(long)]
        title: Option<String>,
        /// beginner, intermediate or advanced
        #[arg(long, value_parser = parse_level)]
        level: Option<TechnicalLevel>,
        /// Target length in minutes (5-60)
        #[arg(long)]
        length: Option<u32>,
        /// Use the given papers instead of the stored preferences
        #[arg(long)]
        no_preferences: bool,
        /// arXiv identifier, repeatable
        #[arg(long = "paper-id")]
        paper_ids: Vec<String>,
    },
    /// List podcasts
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<PodcastStatus>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Fetch generation progress once
    Status {
        podcast_id: i64,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll until generation finishes, printing each change
    Watch {
        podcast_id: i64,
        /// Task to follow when the podcast payload does not list its tasks
        #[arg(long)]
        task: Option<String>,
    },
    /// Show the chapter timetable of a completed podcast
    Chapters { podcast_id: i64 },
    /// Walk through a podcast without an audio device, waiting for generation first
    Play {
        podcast_id: i64,
        /// Playback rate (0.5, 0.75, 1, 1.25, 1.5, 1.75, 2)
        #[arg(long)]
        rate: Option<f32>,
        /// Volume (0.0-1.0)
        #[arg(long)]
        volume: Option<f32>,
        /// Start position in seconds
        #[arg(long)]
        start: Option<f64>,
    },
    /// Cancel a generation task
    Cancel { task_id: String },
    /// Regenerate the audio of an existing podcast
    Regenerate { podcast_id: i64 },
    /// Download the audio file
    Download { podcast_id: i64, path: PathBuf },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error("Podcast {0} could not be fetched: {1}")]
    Fetch(i64, String),

    #[error("Podcast {0} is not playable: {1}")]
    NotPlayable(i64, String),

    #[error("Playback failed: {0}")]
    Playback(String),
}

fn parse_level(input: &str) -> Result<TechnicalLevel, String> {
    TechnicalLevel::parse(input)
        .ok_or_else(|| format!("unknown technical level '{}'", input))
}

fn parse_status(input: &str) -> Result<PodcastStatus, String> {
    serde_json::from_value(serde_json::Value::String(input.trim().to_ascii_lowercase()))
        .map_err(|_| format!("unknown status '{}'", input))
}

/// Runtime dependencies of every API-backed command.
pub struct Session {
    pub api: Arc<dyn PodcastApi>,
    pub ctx: RequestContext,
    pub settings: Settings,
}

impl Session {
    pub fn new(api: Arc<dyn PodcastApi>, settings: Settings) -> Self {
        let ctx = RequestContext::new(settings.access_token.clone());
        Self { api, ctx, settings }
    }
}

pub async fn run(cli: Cli) -> Result<(), CommandError> {
    let mut config = config::load_or_create()?;

    match cli.command {
        Commands::Login { token } => login(&mut config, &token),
        Commands::Logout => {
            config.clear_access_token();
            config::save(&config)?;
            println!("Logged out");
            Ok(())
        }
        Commands::Config => {
            show_config(&config);
            Ok(())
        }
        command => {
            let settings = Settings::resolve(&config);
            let api = Arc::new(HttpPodcastApi::new(settings.api_base_url.clone()));
            execute(command, &Session::new(api, settings)).await
        }
    }
}

fn login(config: &mut AppConfig, token: &str) -> Result<(), CommandError> {
    config.set_access_token(token);
    config::save(config)?;
    match config.access_token() {
        Some(token) => println!("Stored token {}", config::masked_token(&token)),
        None => println!("Empty token, nothing stored"),
    }
    Ok(())
}

fn show_config(config: &AppConfig) {
    let settings = Settings::resolve(config);
    if let Ok(path) = config::config_path() {
        println!("config file:    {}", path.display());
    }
    println!("api base url:   {}", settings.api_base_url);
    println!(
        "access token:   {}",
        settings.masked_token().unwrap_or_else(|| "(none)".to_string())
    );
    println!("poll interval:  {}ms", settings.poll_interval.as_millis());
    println!("volume:         {:.2}", settings.volume);
    println!("playback rate:  {}x", settings.playback_rate.as_f32());
    println!("level:          {:?}", settings.technical_level);
    println!("target length:  {} min", settings.target_length_minutes);
}

/// Dispatches one API-backed command.
pub async fn execute(command: Commands, session: &Session) -> Result<(), CommandError> {
    let api = session.api.as_ref();
    let ctx = &session.ctx;

    match command {
        Commands::Create {
            title,
            level,
            length,
            no_preferences,
            paper_ids,
        } => {
            let request = CreatePodcastRequest {
                title,
                technical_level: level.unwrap_or(session.settings.technical_level),
                target_length: length.unwrap_or(session.settings.target_length_minutes),
                use_preferences: !no_preferences,
                paper_ids,
            };
            request.validate()?;
            let created = api.create_podcast(ctx, &request).await?;
            println!(
                "Podcast {} queued (task {}, {:?})",
                created.podcast_id, created.task_id, created.status
            );
            println!(
                "Follow it with: fionntan watch {} --task {}",
                created.podcast_id, created.task_id
            );
        }
        Commands::List {
            status,
            page,
            limit,
        } => {
            let page = api.list_podcasts(ctx, &ListQuery { status, page, limit }).await?;
            for podcast in &page.podcasts {
                println!(
                    "{:>6}  {:<10}  {}",
                    podcast.id,
                    podcast.status.as_str(),
                    podcast.title
                );
            }
            println!("page {}/{} ({} total)", page.page, page.pages, page.total);
        }
        Commands::Status { podcast_id, json } => {
            let mut tracker = GenerationStatusTracker::new(podcast_id);
            poll_once(api, ctx, &mut tracker).await;
            let snapshot = tracker.snapshot();
            if snapshot.status.is_none() {
                return Err(CommandError::Fetch(
                    podcast_id,
                    snapshot.fetch_error.clone().unwrap_or_default(),
                ));
            }
            if json {
                match serde_json::to_string_pretty(snapshot) {
                    Ok(text) => println!("{}", text),
                    Err(e) => return Err(ApiError::InvalidResponse(e.to_string()).into()),
                }
            } else {
                print_snapshot(snapshot);
            }
        }
        Commands::Watch { podcast_id, task } => watch(session, podcast_id, task).await?,
        Commands::Chapters { podcast_id } => {
            let podcast = api.get_podcast(ctx, podcast_id).await?;
            let duration = podcast
                .audio
                .as_ref()
                .and_then(|audio| audio.duration_seconds)
                .ok_or_else(|| {
                    CommandError::NotPlayable(podcast_id, "audio duration unknown".to_string())
                })?;

            let mut timetable = ChapterTimetable::new(chapter_source(&podcast));
            timetable.set_duration(duration);
            for (idx, chapter) in timetable.chapters().iter().enumerate() {
                println!(
                    "{:>2}. {:>8}  {}",
                    idx + 1,
                    format_time(chapter.start_seconds),
                    chapter.title
                );
            }
            println!("    {:>8}  (end)", format_time(duration));
        }
        Commands::Play {
            podcast_id,
            rate,
            volume,
            start,
        } => {
            let rate = match rate {
                Some(value) => PlaybackRate::try_from(value)?,
                None => session.settings.playback_rate,
            };
            let volume = volume.unwrap_or(session.settings.volume);
            play(session, podcast_id, rate, volume, start).await?;
        }
        Commands::Cancel { task_id } => {
            let response = api.cancel_task(ctx, &task_id).await?;
            println!("{} ({})", response.message, response.task_id);
        }
        Commands::Regenerate { podcast_id } => {
            let accepted = api.regenerate_audio(ctx, podcast_id).await?;
            println!(
                "Audio regeneration queued for podcast {} (task {})",
                podcast_id, accepted.task_id
            );
        }
        Commands::Download { podcast_id, path } => {
            let bytes = api.download_audio(ctx, podcast_id, &path).await?;
            println!("Wrote {} bytes to {}", bytes, path.display());
        }
        Commands::Login { .. } | Commands::Logout | Commands::Config => {}
    }

    Ok(())
}

fn print_snapshot(snapshot: &TrackerSnapshot) {
    let status = snapshot.status.map(PodcastStatus::as_str).unwrap_or("unknown");
    println!("{}  [{}]  {}%", snapshot.pipeline(), status, snapshot.progress);
    if let Some(eta) = snapshot.estimated_time_remaining {
        println!("about {} remaining", format_time(eta as f64));
    }
    if let Some(message) = snapshot
        .podcast
        .as_ref()
        .and_then(|p| p.error_message.as_deref())
    {
        println!("error: {}", message);
    }
    if let Some(error) = &snapshot.fetch_error {
        println!("last poll failed: {}", error);
    }
}

async fn watch(
    session: &Session,
    podcast_id: i64,
    task_id: Option<String>,
) -> Result<(), CommandError> {
    let mut poller = StatusPoller::new(
        session.api.clone(),
        session.ctx.clone(),
        session.settings.poll_interval,
    );
    let handle = poller.track_with_task(podcast_id, task_id);

    let mut last: Option<(Option<PodcastStatus>, usize, u8)> = None;
    let mut final_snapshot = None;
    while let Some(snapshot) = handle.changed().await {
        let key = (snapshot.status, snapshot.stage_index, snapshot.progress);
        if last != Some(key) || snapshot.fetch_error.is_some() {
            print_snapshot(&snapshot);
            last = Some(key);
        }
        final_snapshot = Some(snapshot);
    }

    match final_snapshot {
        Some(snapshot) if snapshot.auth_required => Err(ApiError::Unauthorized.into()),
        _ => Ok(()),
    }
}

async fn play(
    session: &Session,
    podcast_id: i64,
    rate: PlaybackRate,
    volume: f32,
    start: Option<f64>,
) -> Result<(), CommandError> {
    let mut podcast = session.api.get_podcast(&session.ctx, podcast_id).await?;
    if !podcast.status.is_terminal() {
        watch(session, podcast_id, None).await?;
        podcast = session.api.get_podcast(&session.ctx, podcast_id).await?;
    }
    if podcast.status != PodcastStatus::Completed {
        return Err(CommandError::NotPlayable(
            podcast_id,
            podcast
                .error_message
                .unwrap_or_else(|| podcast.status.as_str().to_string()),
        ));
    }

    // The headless clock needs the duration before the engine opens.
    let duration = podcast.audio.as_ref().and_then(|audio| audio.duration_seconds);
    let controller = AudioPlaybackController::with_preferences(
        HeadlessBackend::new(duration),
        volume,
        rate,
    );
    let mut detail = PodcastDetail::new(
        session.api.clone(),
        session.ctx.clone(),
        session.settings.poll_interval,
        controller,
    );
    detail.open(podcast_id);

    loop {
        let update = tokio::select! {
            update = detail.next_update() => update,
            _ = tokio::signal::ctrl_c() => {
                detail.player_mut().pause();
                println!("Stopped at {}", format_time(detail.player().state().current_time_seconds));
                return Ok(());
            }
        };

        match update {
            DetailUpdate::Progress(snapshot) => {
                if snapshot.auth_required {
                    return Err(ApiError::Unauthorized.into());
                }
            }
            DetailUpdate::PollingStopped => {
                if !detail.player().has_engine() {
                    let reason = detail
                        .latest()
                        .and_then(|s| s.status)
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_else(|| "no audio".to_string());
                    return Err(CommandError::NotPlayable(podcast_id, reason));
                }
            }
            DetailUpdate::Idle => {
                return Err(CommandError::NotPlayable(
                    podcast_id,
                    "no audio".to_string(),
                ));
            }
            DetailUpdate::Player(notifications) => {
                for notification in notifications {
                    match notification {
                        PlayerNotification::StatusChanged { status } => match status {
                            PlayerStatus::Ready => {
                                let player = detail.player_mut();
                                println!(
                                    "Ready: {} at {}x",
                                    format_time(player.state().duration_seconds),
                                    player.state().playback_rate.as_f32()
                                );
                                if let Some(start) = start {
                                    player.seek(start);
                                }
                                player.play();
                            }
                            PlayerStatus::Ended => {
                                println!("Finished");
                                return Ok(());
                            }
                            PlayerStatus::Error => {
                                let reason = detail
                                    .player()
                                    .state()
                                    .error
                                    .clone()
                                    .unwrap_or_default();
                                return Err(CommandError::Playback(reason));
                            }
                            _ => {}
                        },
                        PlayerNotification::ChapterChanged { index, title } => {
                            println!(
                                "[{}] Chapter {}: {}",
                                format_time(detail.player().state().current_time_seconds),
                                index + 1,
                                title
                            );
                        }
                    }
                }
            }
        }
    }
}
