use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use pixels::{Error as PixelsError, Pixels, SurfaceTexture};
use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::StartupError;

use super::clock::SystemClock;
use super::game_loop::{Director, GameLoop, LoopError};
use super::manager::GameManager;
use super::metrics::MetricsHandle;
use super::rendering::{Canvas, PixelCanvas};
use super::settings::{GameSettings, SettingsError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
    #[error(transparent)]
    Loop(#[from] LoopError),
}

pub fn run_app(settings: GameSettings, director: Box<dyn Director>) -> Result<(), AppError> {
    run_app_with_metrics(settings, director, MetricsHandle::default())
}

/// Opens a window of `screen_width` x `screen_height`, and drives one
/// [`GameLoop::tick`] per redraw into a pixel buffer of that size. Closing
/// the window or pressing Escape stops the loop.
pub fn run_app_with_metrics(
    settings: GameSettings,
    mut director: Box<dyn Director>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let (buffer_width, buffer_height) = buffer_size(&settings);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(settings.window_title.clone())
            .with_inner_size(LogicalSize::new(
                buffer_width as f64,
                buffer_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let size = window.inner_size();
    let mut pixels = build_pixels(
        Arc::clone(&window),
        (buffer_width, buffer_height),
        (size.width, size.height),
    )
    .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let mut manager = GameManager::with_clock(Arc::new(SystemClock::new()));
    let mut game_loop = GameLoop::with_metrics_handle(&settings, metrics_handle);
    // On failure begin has already run the director and manager shutdown.
    game_loop.begin(&mut manager, director.as_mut())?;
    info!(
        width = buffer_width,
        height = buffer_height,
        fps = settings.fps,
        "window_ready"
    );

    let background = settings.background_color;
    let failure: Rc<RefCell<Option<LoopError>>> = Rc::new(RefCell::new(None));
    let failure_in_loop = Rc::clone(&failure);

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    game_loop.handle().stop();
                    window_target.exit();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if is_escape_press(event.physical_key, event.state) {
                        info!(reason = "escape_key", "shutdown_requested");
                        game_loop.handle().stop();
                        window_target.exit();
                    }
                }
                WindowEvent::Resized(new_size) => {
                    if new_size.width == 0 || new_size.height == 0 {
                        return;
                    }
                    match build_pixels(
                        Arc::clone(&window),
                        (buffer_width, buffer_height),
                        (new_size.width, new_size.height),
                    ) {
                        Ok(rebuilt) => pixels = rebuilt,
                        Err(error) => {
                            warn!(error = %error, "renderer_resize_failed");
                            window_target.exit();
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    if !game_loop.is_running() {
                        window_target.exit();
                        return;
                    }
                    let Some(mut canvas) =
                        PixelCanvas::new(pixels.frame_mut(), buffer_width, buffer_height)
                    else {
                        warn!(
                            width = buffer_width,
                            height = buffer_height,
                            "pixel_buffer_size_mismatch"
                        );
                        window_target.exit();
                        return;
                    };
                    canvas.clear(background);
                    if let Err(loop_error) =
                        game_loop.tick(&mut manager, director.as_mut(), &mut canvas)
                    {
                        error!(error = %loop_error, "game_loop_failed");
                        *failure_in_loop.borrow_mut() = Some(loop_error);
                        window_target.exit();
                        return;
                    }
                    if let Err(error) = pixels.render() {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    if !game_loop.is_running() {
                        window_target.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                game_loop.finish(&mut manager, director.as_mut());
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)?;

    let failed = failure.borrow_mut().take();
    match failed {
        Some(loop_error) => Err(loop_error.into()),
        None => Ok(()),
    }
}

fn build_pixels(
    window: Arc<Window>,
    (buffer_width, buffer_height): (u32, u32),
    (surface_width, surface_height): (u32, u32),
) -> Result<Pixels<'static>, PixelsError> {
    let surface = SurfaceTexture::new(surface_width.max(1), surface_height.max(1), window);
    Pixels::new(buffer_width, buffer_height, surface)
}

fn buffer_size(settings: &GameSettings) -> (u32, u32) {
    (settings.screen_width.max(1), settings.screen_height.max(1))
}

fn is_escape_press(key: PhysicalKey, state: ElementState) -> bool {
    state == ElementState::Pressed && key == PhysicalKey::Code(KeyCode::Escape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_press_stops_but_release_and_other_keys_do_not() {
        assert!(is_escape_press(
            PhysicalKey::Code(KeyCode::Escape),
            ElementState::Pressed
        ));
        assert!(!is_escape_press(
            PhysicalKey::Code(KeyCode::Escape),
            ElementState::Released
        ));
        assert!(!is_escape_press(
            PhysicalKey::Code(KeyCode::Space),
            ElementState::Pressed
        ));
    }

    #[test]
    fn buffer_size_follows_settings_and_never_collapses() {
        assert_eq!(buffer_size(&GameSettings::default()), (800, 600));

        let degenerate = GameSettings {
            screen_width: 0,
            screen_height: 0,
            ..GameSettings::default()
        };
        assert_eq!(buffer_size(&degenerate), (1, 1));
    }

    #[test]
    fn loop_errors_convert_into_app_errors() {
        let error: AppError =
            LoopError::Manager(crate::app::ManagerError::Uninitialized).into();
        assert!(matches!(error, AppError::Loop(_)));
        assert!(error.to_string().contains("call start() before use"));
    }
}
