use std::time::Instant;

use clap::Parser;
use sdl2::keyboard::Keycode;
use tracing::{error, info, warn};

use skyglass::config::{AppConfig, CliArgs, KeyValueStore, MemoryStore};
use skyglass::display::{Display, InputEvent, PixelBuffer, RenderTarget};
use skyglass::logging::init_logging;
use skyglass::sky::SkyRenderer;
use skyglass::util::{FpsCounter, Rng, StopHandle};
use skyglass::weather::{
    presets, FlashCenter, LightningEffect, PrecipitationKind, WeatherFeed, WeatherObservation,
    WeatherPreset,
};

/// Store key for the last selected preset
const PRESET_KEY: &str = "preset";

/// Seconds between FPS log lines while FPS logging is on
const FPS_LOG_INTERVAL: f32 = 2.0;

/// Flash generator for storm presets that carry no lightning of their own
struct LightningAnimator {
    rng: Rng,
    intensity: f32,
    center: FlashCenter,
}

impl LightningAnimator {
    fn new(seed: u64) -> Self {
        Self {
            rng: Rng::new(seed),
            intensity: 0.0,
            center: FlashCenter::default(),
        }
    }

    /// Decay the current flash and maybe strike again
    fn step(&mut self, dt: f32) {
        self.intensity *= (-dt * 6.0).exp();
        // Roughly one strike every three seconds
        if self.rng.next_f32() < dt / 3.0 {
            self.intensity = self.rng.range_f32(0.6, 1.0);
            self.center = FlashCenter {
                x: self.rng.range_f32(0.15, 0.85),
                y: self.rng.range_f32(0.05, 0.4),
            };
        }
    }

    fn apply(&self, weather: &mut WeatherObservation) {
        if weather.lightning.is_some() || weather.precipitation != PrecipitationKind::Storm {
            return;
        }
        if self.intensity > 0.01 {
            weather.lightning = Some(LightningEffect {
                intensity: self.intensity,
                flashes: vec![self.center],
            });
        }
    }
}

fn select_preset(
    presets: &[WeatherPreset],
    index: usize,
    store: &mut impl KeyValueStore,
) -> (usize, WeatherObservation) {
    let index = index % presets.len().max(1);
    let preset = &presets[index];
    info!(index = index + 1, name = preset.name, "weather preset");
    store.set(PRESET_KEY, index.to_string());
    (index, preset.observation.clone())
}

/// Number keys 1-9 map to presets 0-8
fn preset_slot(key: Keycode) -> Option<usize> {
    match key {
        Keycode::Num1 => Some(0),
        Keycode::Num2 => Some(1),
        Keycode::Num3 => Some(2),
        Keycode::Num4 => Some(3),
        Keycode::Num5 => Some(4),
        Keycode::Num6 => Some(5),
        Keycode::Num7 => Some(6),
        Keycode::Num8 => Some(7),
        Keycode::Num9 => Some(8),
        _ => None,
    }
}

fn main() -> skyglass::Result<()> {
    let args = CliArgs::parse();

    let config_path = args.config_path();
    let (mut config, config_error) = match AppConfig::load_or_default(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    config.apply_cli_overrides(&args);
    init_logging(config.log_level.as_deref());
    if let Some(e) = config_error {
        warn!(path = %config_path.display(), "config not loaded, using defaults: {}", e);
    }

    let mut width = config.window.width.max(1);
    let mut height = config.window.height.max(1);
    let (mut display, texture_creator) =
        Display::with_options("skyglass", width, height, config.window.vsync)?;
    let mut target = RenderTarget::with_size(&texture_creator, width, height)?;
    let mut buffer = PixelBuffer::with_size(width, height);

    let mut sky = SkyRenderer::new(width, height, config.sky_options()?);
    if let Some(reason) = sky.cloud_error() {
        warn!("running without clouds: {}", reason);
    }

    let stop = StopHandle::new();
    let feed = match &config.feed.host {
        Some(host) => {
            match WeatherFeed::connect(host, config.feed.port, &config.feed.topic, stop.clone()) {
                Ok(feed) => Some(feed),
                Err(e) => {
                    error!("weather feed unavailable, using presets: {}", e);
                    None
                },
            }
        },
        None => None,
    };

    let presets = presets();
    let mut store = MemoryStore::new();
    let (mut preset_index, mut weather) =
        select_preset(&presets, config.start_preset, &mut store);

    let mut lightning = LightningAnimator::new(config.render.seed);
    let mut fps_counter = FpsCounter::new(60);
    let mut show_fps = false;
    let mut fps_timer = 0.0_f32;
    let mut paused = false;
    let mut pause_started: Option<Instant> = None;
    let mut paused_ms = 0.0_f64;
    let start = Instant::now();

    info!(
        width,
        height,
        vsync = config.window.vsync,
        live = feed.is_some(),
        "skyglass running; 1-9/Left/Right presets, F fps, P pause, Esc quit"
    );

    'main: while !stop.is_stopped() {
        let avg_fps = fps_counter.tick();

        for event in display.poll_events() {
            match event {
                InputEvent::Quit => break 'main,
                InputEvent::Resized { width: w, height: h } => {
                    if w == 0 || h == 0 || (w == width && h == height) {
                        continue;
                    }
                    width = w;
                    height = h;
                    target = RenderTarget::with_size(&texture_creator, width, height)?;
                    buffer.resize(width, height);
                    buffer.clear(0, 0, 0);
                    sky.resize(width, height);
                },
                InputEvent::KeyDown(key) => match key {
                    Keycode::Escape => break 'main,
                    Keycode::F => {
                        show_fps = !show_fps;
                        fps_timer = 0.0;
                    },
                    Keycode::P => {
                        paused = !paused;
                        match pause_started.take() {
                            Some(t) => paused_ms += t.elapsed().as_secs_f64() * 1000.0,
                            None => pause_started = Some(Instant::now()),
                        }
                        info!(paused, "animation");
                    },
                    Keycode::Left => {
                        let prev = (preset_index + presets.len() - 1) % presets.len();
                        (preset_index, weather) = select_preset(&presets, prev, &mut store);
                    },
                    Keycode::Right => {
                        (preset_index, weather) =
                            select_preset(&presets, preset_index + 1, &mut store);
                    },
                    _ => {
                        if let Some(index) = preset_slot(key) {
                            (preset_index, weather) = select_preset(&presets, index, &mut store);
                        }
                    },
                },
            }
        }

        if let Some(feed) = &feed {
            if let Some(observation) = feed.poll() {
                weather = observation;
            }
        }

        if !paused {
            // Paused spans are cut out of the renderer's timeline
            let now_ms = start.elapsed().as_secs_f64() * 1000.0 - paused_ms;
            lightning.step(1.0 / avg_fps.max(1.0));
            let mut frame_weather = weather.clone();
            lightning.apply(&mut frame_weather);
            sky.render_frame(now_ms, &frame_weather, &mut buffer);
        }

        if show_fps {
            fps_timer += fps_counter.avg_frame_time_ms() / 1000.0;
            if fps_timer >= FPS_LOG_INTERVAL {
                fps_timer = 0.0;
                let (min_fps, max_fps) = fps_counter.min_max_fps();
                info!(
                    avg = avg_fps as u32,
                    min = min_fps as u32,
                    max = max_fps as u32,
                    ms = fps_counter.avg_frame_time_ms() as u32,
                    sprites = sky.sun().cache().len(),
                    particles = sky.precipitation().len(),
                    "fps"
                );
            }
        }

        display.present(&mut target, &buffer)?;
    }

    stop.stop();
    if let Some(feed) = &feed {
        feed.stop();
    }
    if let Some(last) = store.get(PRESET_KEY) {
        info!(preset = %last, "last preset");
    }
    sky.dispose();
    Ok(())
}
