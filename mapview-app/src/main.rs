use mapview::runtime::executors::tokio_impl::TokioExecutor;
use mapview::{HeadlessControllerFactory, MapView, ViewContext};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long to wait for the controller before giving up
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Headless map view driver
///
/// Usage: `mapview-app [scene-path] [asset-root]`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let scene_path = args.next().unwrap_or_else(|| "scene.yaml".to_string());
    let factory = match args.next() {
        Some(root) => HeadlessControllerFactory::with_asset_root(root),
        None => HeadlessControllerFactory::new(),
    };

    let context = ViewContext::new(factory).with_executor(Arc::new(TokioExecutor::current()?));
    let mut view = MapView::new(context)?;
    view.on_create(None);
    view.on_resume();

    let started = Instant::now();
    let ready = Rc::new(RefCell::new(false));
    let flag = ready.clone();
    view.get_map_async(
        move |view, _controller| {
            log::info!(
                "map ready after {:?}, surface attached: {}",
                started.elapsed(),
                view.is_surface_attached()
            );
            *flag.borrow_mut() = true;
        },
        &scene_path,
    )?;

    if !view.wait_for_event(READY_TIMEOUT)? {
        log::error!("map for '{}' not ready within {:?}", scene_path, READY_TIMEOUT);
    }

    println!("scene:    {}", scene_path);
    println!("ready:    {}", *ready.borrow());
    println!("state:    {:?}", view.state());
    println!("attached: {}", view.is_surface_attached());

    view.on_pause();
    view.on_destroy();
    println!("state after destroy: {:?}", view.state());

    Ok(())
}
