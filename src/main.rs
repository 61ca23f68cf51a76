use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use rfpip::platform::HeadlessPlatform;
use rfpip::{PictureInPictureEvent, PictureInPictureWindowOptions, PipConfig, Size, Window};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Run a headless Document Picture-in-Picture scenario and print the event
/// log as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "rfpip", version, about)]
struct Cli {
    /// Opener page URL
    #[arg(long, default_value = "https://example.com/player")]
    url: String,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Request constrainAspectRatio
    #[arg(long)]
    constrain: bool,
    /// Call setAspectRatio after opening
    #[arg(long)]
    aspect_ratio: Option<f32>,
    /// Simulate a user resize, e.g. 640x360
    #[arg(long, value_parser = parse_size)]
    resize: Option<Size>,
    /// Request without user activation
    #[arg(long)]
    no_gesture: bool,
    #[arg(long, value_enum, default_value_t = ExitTrigger::Script)]
    exit: ExitTrigger,
    /// UA configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Scenario file (JSON); overrides the scenario flags above
    #[arg(long)]
    scenario: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ExitTrigger {
    Script,
    User,
    Navigate,
    CloseOpener,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Scenario {
    url: String,
    options: PictureInPictureWindowOptions,
    aspect_ratio: Option<f32>,
    resize: Option<Size>,
    gesture: bool,
    exit: ExitTrigger,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            url: "https://example.com/player".to_string(),
            options: PictureInPictureWindowOptions::default(),
            aspect_ratio: None,
            resize: None,
            gesture: true,
            exit: ExitTrigger::Script,
        }
    }
}

impl From<&Cli> for Scenario {
    fn from(cli: &Cli) -> Self {
        Scenario {
            url: cli.url.clone(),
            options: PictureInPictureWindowOptions {
                width: cli.width,
                height: cli.height,
                constrain_aspect_ratio: cli.constrain,
            },
            aspect_ratio: cli.aspect_ratio,
            resize: cli.resize,
            gesture: !cli.no_gesture,
            exit: cli.exit,
        }
    }
}

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    Ok(Size::new(width, height))
}

fn emit(value: serde_json::Value) {
    println!("{}", value);
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn run(scenario: Scenario, config: PipConfig) -> anyhow::Result<()> {
    let window = Window::new(&scenario.url, config, Arc::new(HeadlessPlatform::new()))?;
    let home = window.document();
    let Some(home_body) = home.body() else {
        bail!("opener document has no body");
    };

    let player = home.create_element("div")?;
    player.set_attribute("id", "player")?;
    player.set_text_content("Now playing")?;
    home_body.append_child(&player)?;

    window.set_onenterpictureinpicture(|ev: &PictureInPictureEvent| {
        let pip = ev.picture_in_picture_window();
        emit(json!({ "event": ev.event_type(), "window": pip.id(), "size": pip.inner_size() }));
    });
    {
        let player = player.clone();
        let home_body = home_body.clone();
        window.set_onexitpictureinpicture(move |ev: &PictureInPictureEvent| {
            let pip = ev.picture_in_picture_window();
            let document_alive = pip.document().map(|d| d.is_active()).unwrap_or(false);
            let restored = home_body.append_child(&player).is_ok();
            emit(json!({
                "event": ev.event_type(),
                "reason": ev.exit_reason(),
                "document_alive": document_alive,
                "restored": restored,
            }));
        });
    }

    if scenario.gesture {
        window.notify_user_activation();
    }
    let pip = match futures::executor::block_on(window.request_picture_in_picture_window(scenario.options)) {
        Ok(pip) => pip,
        Err(err) => {
            emit(json!({ "event": "rejected", "error": err.to_string() }));
            return Ok(());
        }
    };

    let pip_document = pip.document().context("new window has no document")?;
    pip_document
        .body()
        .context("new window has no body")?
        .append_child(&player)?;
    emit(json!({
        "event": "moved",
        "in_pip": pip_document.contains(&player),
        "in_opener": home.contains(&player),
    }));

    if let Some(ratio) = scenario.aspect_ratio {
        let res = futures::executor::block_on(pip.set_aspect_ratio(ratio));
        emit(json!({
            "event": "aspect_ratio",
            "ratio": ratio,
            "error": res.err().map(|e| e.to_string()),
            "size": pip.inner_size(),
        }));
    }

    if let Some(size) = scenario.resize {
        let applied = pip.resize_by_user(size.width, size.height)?;
        emit(json!({ "event": "resize", "requested": size, "applied": applied }));
    }

    match scenario.exit {
        ExitTrigger::Script => home.exit_picture_in_picture()?,
        ExitTrigger::User => pip.close_by_user(),
        ExitTrigger::Navigate => {
            let outcome = pip_document.navigate("https://example.com/elsewhere")?;
            emit(json!({ "event": "navigation", "outcome": outcome }));
        }
        ExitTrigger::CloseOpener => window.close(),
    }

    emit(json!({
        "event": "done",
        "state": window.picture_in_picture_state(),
        "pip_closed": pip.is_closed(),
        "player_in_opener": home.contains(&player),
    }));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => read_json::<PipConfig>(path)?,
        None => PipConfig::default(),
    };
    let scenario = match &cli.scenario {
        Some(path) => read_json::<Scenario>(path)?,
        None => Scenario::from(&cli),
    };
    log::debug!("running scenario {:?}", scenario);
    run(scenario, config)
}
