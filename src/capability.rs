//! Graphics capability detection.

/// Something that can try to create a hardware-accelerated drawing
/// context, e.g. a canvas asked for `webgl`.
pub trait GraphicsProbe {
    /// `Ok(true)` if a context was created, `Ok(false)` if the platform
    /// returned none, `Err` if the attempt itself blew up.
    fn create_accelerated_context(&self) -> Result<bool, String>;
}

/// Whether the environment can render a scene.
///
/// With no probe (no execution environment, e.g. prerendering) this is
/// optimistic and returns `true`; capability that cannot be determined
/// never blocks the scene.
pub fn graphics_supported(probe: Option<&dyn GraphicsProbe>) -> bool {
    let Some(probe) = probe else {
        return true;
    };
    match probe.create_accelerated_context() {
        Ok(created) => created,
        Err(e) => {
            log::debug!("graphics probe failed: {e}");
            false
        }
    }
}
