//! Log output of the pipeline.
//!
//! Installs a capturing logger for the whole test binary, so it lives apart
//! from the other integration tests that use `env_logger`.

mod common;

use std::sync::{Arc, Once};

use glam::{Mat4, Vec3};
use log::{Level, LevelFilter, Metadata, Record};
use parking_lot::Mutex;

use common::TestContext;
use scene_renderer::backend::FramebufferHandle;
use scene_renderer::scene::{BoundingSphere, Camera, Projection};
use scene_renderer::{Extent, OutlineRenderer, RendererConfig};

const EXTENT: Extent = Extent::new(160, 90);

struct CaptureLogger {
    records: Mutex<Vec<(Level, String, String)>>,
}

impl log::Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("scene_renderer")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.records.lock().push((
                record.level(),
                record.target().to_owned(),
                record.args().to_string(),
            ));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: parking_lot::const_mutex(Vec::new()),
};

/// Must run before anything calls `common::init_logging`
fn capture() -> &'static CaptureLogger {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).expect("no logger installed yet");
        log::set_max_level(LevelFilter::Debug);
    });
    &LOGGER
}

fn logged(logger: &CaptureLogger, level: Level, target: &str, needle: &str) -> bool {
    logger
        .records
        .lock()
        .iter()
        .any(|(l, t, message)| *l == level && t == target && message.contains(needle))
}

#[test]
fn missing_outline_extension_is_logged() {
    let logger = capture();
    let mut test = TestContext::new(EXTENT);
    test.add_cube(Mat4::IDENTITY, BoundingSphere::new(Vec3::ZERO, 1.0));
    let mut renderer = test.renderer(&RendererConfig::default()).unwrap();
    *renderer.camera_mut() = Camera::looking_at(
        Vec3::ZERO,
        Vec3::NEG_Z,
        Projection::perspective(45.0, EXTENT.aspect_ratio(), 0.1, 100.0),
    );

    let mut outline = OutlineRenderer::new(&RendererConfig::default());
    outline
        .initialize(&mut test.ctx, &test.library, &mut test.viewport)
        .unwrap();
    let outline = Arc::new(Mutex::new(outline));
    OutlineRenderer::register(&outline, renderer.events_mut());

    renderer
        .render(&mut test.ctx, FramebufferHandle::DEFAULT)
        .unwrap();

    assert!(logged(
        logger,
        Level::Debug,
        "scene_renderer::pipeline::outline",
        "no outline extension"
    ));
    assert_eq!(test.ctx.draws_with_shader("PostSobel"), 0);
}
