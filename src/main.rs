use clap::Parser;
use drafthud::constants::{
    API_BASE_URL, AUTH_BASE_URL, AUTH_CLIENT_ID, AUTH_REALM, TARGET_WINDOW_TITLE,
};
use drafthud::error::AppResult;
use drafthud::models::settings::{Settings, SettingsHandle};
use drafthud::modules::api::{AnalysisClient, HttpTransport};
use drafthud::modules::auth::{
    establish_session, HttpSessionProbe, OpenIdIssuer, SessionManager, TokenStore,
};
use drafthud::modules::capture::dev_deck::DevDeck;
use drafthud::modules::capture::{
    CaptureGate, CaptureOrigin, CaptureRequest, CaptureTrigger, ScreenshotWatcher, XcapCapture,
};
use drafthud::modules::overlay::{
    GlobalHotkeyBackend, HotkeyAction, HotkeyBinding, HotkeyRegistry, LayoutId, OverlayCoordinator,
    OverlayPlacement, VisibilityState, XcapWindowLocator,
};
use drafthud::modules::pipeline::AnalysisPipeline;
use drafthud::modules::system::logger::init_logger;
use drafthud::modules::system::paths::screenshot_dirs;
use global_hotkey::{GlobalHotKeyEvent, HotKeyState};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "drafthud", version, about)]
struct Args {
    /// Override the swap-layout score threshold and persist it.
    #[arg(long)]
    min_score_swap: Option<i32>,

    /// Override the composition-layout score threshold and persist it.
    #[arg(long)]
    min_score_comp: Option<i32>,

    /// Work without the game: replay saved screenshots, skip window gating.
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() {
    init_logger();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> AppResult<()> {
    let settings = SettingsHandle::new(Settings::load());
    if args.min_score_swap.is_some() || args.min_score_comp.is_some() {
        settings.update(|s| {
            if let Some(v) = args.min_score_swap {
                s.min_score_swap = v;
            }
            if let Some(v) = args.min_score_comp {
                s.min_score_comp = v;
            }
        })?;
        info!("Score thresholds overridden from the command line");
    }

    let issuer = OpenIdIssuer::new(AUTH_BASE_URL, AUTH_REALM, AUTH_CLIENT_ID);
    let probe = HttpSessionProbe::new(API_BASE_URL);
    let session = SessionManager::new(issuer, probe, TokenStore::new()?);
    establish_session(&session).await?;

    let visibility = Arc::new(VisibilityState::new());
    let locator = Arc::new(XcapWindowLocator::new(TARGET_WINDOW_TITLE));
    let gate = Arc::new(CaptureGate::new(locator.clone(), args.dev));
    let placement = Arc::new(OverlayPlacement::new(
        visibility.clone(),
        locator,
        args.dev,
    ));
    tokio::spawn(placement.clone().run());

    let (capture_tx, capture_rx) = mpsc::unbounded_channel::<CaptureRequest>();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let client = AnalysisClient::new(session.clone(), HttpTransport::new(API_BASE_URL));
    let pipeline = Arc::new(AnalysisPipeline::new(client, event_tx));
    tokio::spawn(pipeline.clone().run(capture_rx));

    let coordinator = Arc::new(OverlayCoordinator::new(visibility.clone(), settings.clone()));
    tokio::spawn(coordinator.clone().run_events(event_rx));
    tokio::spawn(coordinator.clone().run_status_ticker());

    // Re-arm the pipeline whenever the session comes back after an expiry.
    {
        let pipeline = pipeline.clone();
        let mut expiry_rx = session.subscribe_expiry();
        tokio::spawn(async move {
            while expiry_rx.changed().await.is_ok() {
                if !*expiry_rx.borrow() {
                    pipeline.reset_halt();
                }
            }
        });
    }

    let watched_dirs = screenshot_dirs();
    let _watcher = ScreenshotWatcher::start(&watched_dirs, gate.clone(), capture_tx.clone())?;

    let trigger = Arc::new(CaptureTrigger::new(
        visibility.clone(),
        Arc::new(XcapCapture),
        gate,
        settings.clone(),
        capture_tx.clone(),
    ));

    let registry = Arc::new(HotkeyRegistry::new(GlobalHotkeyBackend::new()?));
    registry.apply(&bindings_from(&settings.snapshot(), args.dev))?;

    // Settings changes re-apply the binding set without a restart.
    {
        let registry = registry.clone();
        let settings = settings.clone();
        let dev = args.dev;
        let mut rx = settings.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if let Err(e) = registry.apply(&bindings_from(&settings.snapshot(), dev)) {
                    warn!("Failed to re-apply hotkeys: {}", e);
                }
            }
        });
    }

    let mut dev_deck = args.dev.then(|| DevDeck::scan(&watched_dirs));
    if let Some(deck) = &dev_deck {
        if let Some(newest) = deck.newest() {
            info!("Dev mode: replaying newest screenshot {}", newest.display());
            replay_screenshot(newest.clone(), &capture_tx).await;
        }
    }

    // Hotkey events arrive on a crossbeam channel; bridge them onto the runtime.
    let (hotkey_tx, mut hotkey_rx) = mpsc::unbounded_channel::<GlobalHotKeyEvent>();
    std::thread::spawn(move || {
        let receiver = GlobalHotKeyEvent::receiver();
        while let Ok(event) = receiver.recv() {
            if hotkey_tx.send(event).is_err() {
                break;
            }
        }
    });

    info!("drafthud running; press Ctrl+C to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = hotkey_rx.recv() => {
                let Some(action) = registry.action_for(event.id) else { continue };
                match (action, event.state) {
                    (HotkeyAction::ToggleSwapPanel, HotKeyState::Pressed) => {
                        visibility.toggle_layout(LayoutId::SwapSuggestions);
                    }
                    (HotkeyAction::ToggleCompPanel, HotKeyState::Pressed) => {
                        visibility.toggle_layout(LayoutId::TeamComposition);
                    }
                    (HotkeyAction::Capture, HotKeyState::Pressed) => {
                        let trigger = trigger.clone();
                        tokio::spawn(async move { trigger.on_capture_key_down().await });
                    }
                    (HotkeyAction::Capture, HotKeyState::Released) => {
                        trigger.on_capture_key_up();
                    }
                    (HotkeyAction::DevOlderScreenshot, HotKeyState::Pressed) => {
                        if let Some(path) = dev_deck.as_mut().and_then(|d| d.older().cloned()) {
                            replay_screenshot(path, &capture_tx).await;
                        }
                    }
                    (HotkeyAction::DevNewerScreenshot, HotKeyState::Pressed) => {
                        if let Some(path) = dev_deck.as_mut().and_then(|d| d.newer().cloned()) {
                            replay_screenshot(path, &capture_tx).await;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    session.logout().await;
    info!("Shutting down");
    Ok(())
}

fn bindings_from(settings: &Settings, dev: bool) -> Vec<HotkeyBinding> {
    let mut bindings = vec![
        HotkeyBinding {
            action: HotkeyAction::ToggleSwapPanel,
            key_code: settings.swap_panel_key,
        },
        HotkeyBinding {
            action: HotkeyAction::ToggleCompPanel,
            key_code: settings.comp_panel_key,
        },
        HotkeyBinding {
            action: HotkeyAction::Capture,
            key_code: settings.capture_key,
        },
    ];
    if dev {
        bindings.push(HotkeyBinding {
            action: HotkeyAction::DevOlderScreenshot,
            key_code: 0x78, // F9
        });
        bindings.push(HotkeyBinding {
            action: HotkeyAction::DevNewerScreenshot,
            key_code: 0x79, // F10
        });
    }
    bindings
}

async fn replay_screenshot(
    path: std::path::PathBuf,
    tx: &mpsc::UnboundedSender<CaptureRequest>,
) {
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let _ = tx.send(CaptureRequest::new(bytes, CaptureOrigin::FileWatch));
        }
        Err(e) => warn!("Cannot read screenshot {}: {}", path.display(), e),
    }
}
